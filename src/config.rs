use crate::error::{ReportError, ReportResult};
use crate::peer::PercentileKind;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cumulative environmental impact figures shown as headline KPIs.
///
/// These come from the operator's impact methodology, not from the
/// collection data, so they are configured rather than computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactKpis {
    pub period_label: String,
    /// CO2 avoided through non-incineration and recycling, in `co2_unit`.
    pub co2_reduction: f64,
    pub co2_unit: String,
    /// m3 of water saved versus incineration/landfill.
    pub water_saved: f64,
    /// MWh recovered.
    pub energy_recovered: f64,
    pub pine_tree_equivalent: u64,
    pub passenger_car_equivalent: u64,
}

impl Default for ImpactKpis {
    fn default() -> Self {
        Self {
            period_label: "2024 cumulative".to_string(),
            co2_reduction: 1134.7,
            co2_unit: "MtCO2eq.".to_string(),
            water_saved: 3058.58,
            energy_recovered: 758_923.0,
            pine_tree_equivalent: 112_501,
            passenger_car_equivalent: 873,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub monthly_path: PathBuf,
    pub benchmark_path: PathBuf,
    pub output_dir: PathBuf,
    pub customer_label: String,
    /// Rows shown per table in console previews.
    pub preview_rows: usize,
    /// The peer section is dormant unless switched on.
    pub include_peer_comparison: bool,
    pub percentile_kind: PercentileKind,
    /// Restrict the report to these waste groups; `None` means all.
    pub groups: Option<Vec<String>>,
    pub impact: ImpactKpis,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            monthly_path: PathBuf::from("monthly_amount.csv"),
            benchmark_path: PathBuf::from("industry_avg_amount.csv"),
            output_dir: PathBuf::from("."),
            customer_label: "Customer B".to_string(),
            preview_rows: 5,
            include_peer_comparison: false,
            percentile_kind: PercentileKind::default(),
            groups: None,
            impact: ImpactKpis::default(),
        }
    }
}

impl ReportConfig {
    pub fn from_json_str(s: &str) -> ReportResult<Self> {
        let cfg: ReportConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> ReportResult<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> ReportResult<()> {
        if self.preview_rows == 0 {
            return Err(ReportError::Config(
                "preview_rows must be at least 1".to_string(),
            ));
        }
        if self.monthly_path.as_os_str().is_empty() || self.benchmark_path.as_os_str().is_empty() {
            return Err(ReportError::Config(
                "monthly_path and benchmark_path must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides of the form `--flag value` / `--flag`.
    pub fn apply_args(&mut self, args: &[String]) -> ReportResult<()> {
        if let Some(v) = arg_value(args, "--monthly") {
            self.monthly_path = PathBuf::from(v);
        }
        if let Some(v) = arg_value(args, "--benchmark") {
            self.benchmark_path = PathBuf::from(v);
        }
        if let Some(v) = arg_value(args, "--out") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = arg_value(args, "--groups") {
            let groups = parse_group_list(v);
            if groups.is_empty() {
                warn!("--groups {:?} names no groups; using all groups", v);
                self.groups = None;
            } else {
                self.groups = Some(groups);
            }
        }
        if let Some(v) = arg_value(args, "--preview-rows") {
            self.preview_rows = v
                .parse()
                .map_err(|_| ReportError::Config(format!("--preview-rows: not a number: {}", v)))?;
        }
        if args.iter().any(|a| a == "--peer") {
            self.include_peer_comparison = true;
        }
        self.validate()
    }
}

pub fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// Split a comma-separated group list, dropping blanks.
pub fn parse_group_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}
