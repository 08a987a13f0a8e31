// Report assembly: runs filter, aggregation, year-over-year and the optional
// peer stage over a loaded dataset, and formats the results for the console.
use crate::aggregate::{
    self, composition, filter_series, group_options, group_sum, pivot, report_snapshot,
    CompositionRow, GroupKey, GroupSelection, GroupedSeries, PivotTable,
};
use crate::config::{ImpactKpis, ReportConfig};
use crate::loader::Dataset;
use crate::peer::{compare_with_peers, PeerComparison, PercentileKind};
use crate::types::{CompositionTableRow, MonthlyRecord, PercentileTableRow, YoyTableRow};
use crate::util::{format_number, format_pct, month_label};
use crate::yoy::{compare_year_over_year, waterfall, Waterfall, YoyComparison, YoyTotal};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;

/// Everything one render of the report needs. Built fresh on every run and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct EcoReport {
    pub customer_label: String,
    pub report_date: Option<NaiveDate>,
    /// `YYYY-MM` of `report_date`, empty when there is no data.
    pub report_month: String,
    pub selected_groups: Vec<String>,
    /// Requested groups that do not occur in the monthly data.
    pub unknown_groups: Vec<String>,
    pub impact: ImpactKpis,
    pub snapshot: Vec<MonthlyRecord>,
    pub composition: Vec<CompositionRow>,
    pub series: Vec<MonthlyRecord>,
    pub by_group: GroupedSeries,
    pub by_item: GroupedSeries,
    pub pivot: PivotTable,
    pub yoy: YoyComparison,
    pub waterfall: Option<Waterfall>,
    /// Present only when the peer stage was requested.
    pub peer: Option<PeerComparison>,
}

impl EcoReport {
    pub fn has_data(&self) -> bool {
        !self.series.is_empty()
    }
}

/// Assembles an [`EcoReport`] from a loaded dataset. Stages run in order:
/// filter, aggregate, year-over-year, then the optional peer comparison.
pub struct ReportBuilder<'a> {
    dataset: &'a Dataset,
    selection: GroupSelection,
    include_peer: bool,
    percentile_kind: PercentileKind,
    customer_label: String,
    impact: ImpactKpis,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            selection: GroupSelection::All,
            include_peer: false,
            percentile_kind: PercentileKind::default(),
            customer_label: String::new(),
            impact: ImpactKpis::default(),
        }
    }

    pub fn from_config(dataset: &'a Dataset, cfg: &ReportConfig) -> Self {
        let selection = match &cfg.groups {
            Some(groups) => GroupSelection::only(groups.iter().cloned()),
            None => GroupSelection::All,
        };
        Self::new(dataset)
            .groups(selection)
            .peer_comparison(cfg.include_peer_comparison)
            .percentile_kind(cfg.percentile_kind)
            .customer_label(&cfg.customer_label)
            .impact(cfg.impact.clone())
    }

    pub fn groups(mut self, selection: GroupSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn peer_comparison(mut self, on: bool) -> Self {
        self.include_peer = on;
        self
    }

    pub fn percentile_kind(mut self, kind: PercentileKind) -> Self {
        self.percentile_kind = kind;
        self
    }

    pub fn customer_label(mut self, label: &str) -> Self {
        self.customer_label = label.to_string();
        self
    }

    pub fn impact(mut self, impact: ImpactKpis) -> Self {
        self.impact = impact;
        self
    }

    pub fn build(self) -> EcoReport {
        let monthly = &self.dataset.monthly;
        let report_date = aggregate::report_date(monthly);
        let options = group_options(monthly);
        let selected_groups = self.selection.resolve(&options);
        let unknown_groups = self.selection.unknown(&options);
        if !unknown_groups.is_empty() {
            warn!(
                "unknown waste group(s) ignored: {} (available: {})",
                unknown_groups.join(", "),
                options.join(", ")
            );
        }
        if selected_groups.is_empty() {
            warn!("no waste groups selected; report will be empty");
        }

        let series = match report_date {
            Some(rd) => filter_series(monthly, &self.selection, rd),
            None => Vec::new(),
        };
        let snapshot = match report_date {
            Some(rd) => report_snapshot(&series, rd),
            None => Vec::new(),
        };
        debug!(
            "series: {} rows, snapshot: {} rows",
            series.len(),
            snapshot.len()
        );

        let yoy = compare_year_over_year(&snapshot);
        let waterfall = waterfall(&yoy);

        // Benchmark figures are whole-period averages, so the group filter
        // does not apply to them.
        let peer = if self.include_peer {
            Some(compare_with_peers(
                &self.dataset.benchmark_target,
                &self.dataset.benchmark_competitors,
                self.percentile_kind,
            ))
        } else {
            None
        };

        let report = EcoReport {
            customer_label: self.customer_label,
            report_date,
            report_month: report_date.map(month_label).unwrap_or_default(),
            selected_groups,
            unknown_groups,
            impact: self.impact,
            composition: composition(&snapshot),
            by_group: group_sum(&series, GroupKey::Group),
            by_item: group_sum(&series, GroupKey::Item),
            pivot: pivot(&series),
            snapshot,
            series,
            yoy,
            waterfall,
            peer,
        };
        info!(
            "report for {} built: {} yoy rows, peer section {}",
            if report.report_month.is_empty() { "-" } else { report.report_month.as_str() },
            report.yoy.rows.len(),
            if report.peer.is_some() { "included" } else { "skipped" }
        );
        report
    }
}

// Console table rows

pub fn composition_table(rows: &[CompositionRow]) -> Vec<CompositionTableRow> {
    rows.iter()
        .map(|r| CompositionTableRow {
            group: r.waste_item_group.clone(),
            item: r.waste_item.clone(),
            amount: format_number(r.amount, 0),
            share_of_group: format_pct(r.share_of_group, 1),
            share_of_total: format_pct(r.share_of_total, 1),
        })
        .collect()
}

pub fn yoy_table(cmp: &YoyComparison) -> Vec<YoyTableRow> {
    cmp.rows
        .iter()
        .map(|r| YoyTableRow {
            group: r.waste_item_group.clone(),
            item: r.waste_item.clone(),
            prior: format_number(r.prior_year_monthly_amount, 0),
            current: format_number(r.monthly_amount, 0),
            delta: format_number(r.delta, 0),
            yoy_growth: r
                .yoy_growth
                .map(|g| format_pct(g, 2))
                .unwrap_or_else(|| "-".to_string()),
            derived_growth: format_pct(r.derived_growth, 2),
        })
        .collect()
}

pub fn percentile_table(peer: &PeerComparison) -> Vec<PercentileTableRow> {
    peer.percentiles
        .iter()
        .map(|p| PercentileTableRow {
            item: p.waste_item.clone(),
            target_value: format_number(p.target_value, 0),
            peer_count: p.peer_count,
            peer_mean: format_number(p.peer_mean, 0),
            percentile: format_number(p.percentile, 1),
            top_share: format!("{}%", format_number(p.top_share, 1)),
        })
        .collect()
}

/// One-line KPI summary for the report month, e.g.
/// `"1,200 kg (-300 kg YoY, -20.0%)"`.
pub fn yoy_headline(total: &YoyTotal) -> String {
    format!(
        "{} kg ({} kg YoY, {})",
        format_number(total.total_ty, 0),
        format_number(total.total_delta, 0),
        format_pct(total.total_growth, 1)
    )
}

/// Narrative sentences for the peer section, in reading order.
pub fn peer_narrative(customer: &str, peer: &PeerComparison) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(d) = &peer.diversity {
        lines.push(format!(
            "Peers report {} waste items on average; {} reports {}.",
            format_number(d.peer_mean_items, 0),
            customer,
            d.target_items
        ));
    }
    if let Some(r) = &peer.reference {
        lines.push(format!(
            "The most common item among peers is '{}'; for it, {} {}",
            r.waste_item, customer, r.message
        ));
    }
    if let (Some(top), Some(worst)) = (&peer.top_volume_item, &peer.relative_worst) {
        lines.push(format!(
            "By volume '{}' is the largest item, but relative to peers '{}' stands out (top {}%).",
            top,
            worst.waste_item,
            format_number(worst.top_share, 1)
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BenchmarkRecord;
    use crate::util::month_label;

    fn rec(date: (i32, u32, u32), group: &str, item: &str, ty: f64, ly: f64, g: Option<f64>) -> MonthlyRecord {
        let base_date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        MonthlyRecord {
            base_date,
            month: month_label(base_date),
            waste_item_group: group.to_string(),
            waste_item: item.to_string(),
            monthly_amount: ty,
            prior_year_monthly_amount: ly,
            yoy_growth: g,
        }
    }

    fn bench(company: &str, item: &str, amount: f64, target: bool) -> BenchmarkRecord {
        BenchmarkRecord {
            customer_company_name: company.to_string(),
            waste_item_group: "G".to_string(),
            waste_item: item.to_string(),
            avg_monthly_amount: amount,
            is_target_customer: target,
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            monthly: vec![
                rec((2024, 9, 1), "Food", "Food waste", 100.0, 90.0, Some(0.11)),
                rec((2024, 9, 1), "Plastic", "PET", 20.0, 0.0, None),
                rec((2024, 10, 1), "Food", "Food waste", 80.0, 100.0, Some(-0.2)),
                rec((2024, 10, 1), "Plastic", "PET", 30.0, 20.0, Some(0.5)),
                rec((2024, 11, 20), "Food", "Food waste", 10.0, 0.0, None),
            ],
            benchmark_target: vec![bench("T", "Food waste", 90.0, true)],
            benchmark_competitors: vec![
                bench("A", "Food waste", 50.0, false),
                bench("B", "Food waste", 70.0, false),
            ],
        }
    }

    #[test]
    fn builds_all_sections_for_report_month() {
        let ds = dataset();
        let report = ReportBuilder::new(&ds).build();
        assert_eq!(report.report_month, "2024-10");
        assert_eq!(report.selected_groups, vec!["Food", "Plastic"]);
        assert_eq!(report.series.len(), 4);
        assert_eq!(report.snapshot.len(), 2);
        assert_eq!(report.by_group.series.len(), 2);
        assert_eq!(report.pivot.months, vec!["2024-09", "2024-10"]);
        assert_eq!(report.yoy.rows[0].waste_item, "Food waste");
        assert_eq!(report.yoy.total.total_ly, 120.0);
        assert_eq!(report.yoy.total.total_ty, 110.0);
        assert!(report.waterfall.is_some());
        assert!(report.peer.is_none());
    }

    #[test]
    fn peer_stage_is_optional_and_independent() {
        let ds = dataset();
        let without = ReportBuilder::new(&ds).build();
        let with = ReportBuilder::new(&ds).peer_comparison(true).build();
        let peer = with.peer.as_ref().unwrap();
        assert_eq!(peer.percentiles.len(), 1);
        assert_eq!(peer.percentiles[0].percentile, 100.0);
        assert_eq!(without.yoy, with.yoy);
        assert_eq!(without.pivot, with.pivot);
        assert_eq!(without.composition, with.composition);
    }

    #[test]
    fn group_filter_limits_series() {
        let ds = dataset();
        let report = ReportBuilder::new(&ds)
            .groups(GroupSelection::only(["Plastic"]))
            .build();
        assert!(report.series.iter().all(|r| r.waste_item_group == "Plastic"));
        assert_eq!(report.by_group.series.len(), 1);
        assert_eq!(report.yoy.rows.len(), 1);
    }

    #[test]
    fn empty_dataset_produces_empty_report() {
        let ds = Dataset::default();
        let report = ReportBuilder::new(&ds).peer_comparison(true).build();
        assert!(!report.has_data());
        assert_eq!(report.report_date, None);
        assert!(report.report_month.is_empty());
        assert!(report.yoy.is_empty());
        assert!(report.waterfall.is_none());
        assert!(report.pivot.is_empty());
        assert!(report.peer.unwrap().percentiles.is_empty());
    }

    #[test]
    fn table_rows_are_formatted() {
        let ds = dataset();
        let report = ReportBuilder::new(&ds).build();
        let rows = yoy_table(&report.yoy);
        assert_eq!(rows[0].delta, "-20");
        assert_eq!(rows[0].yoy_growth, "-20.00%");
        assert_eq!(yoy_headline(&report.yoy.total), "110 kg (-10 kg YoY, -8.3%)");
    }

    #[test]
    fn narrative_mentions_relative_worst_item() {
        let ds = dataset();
        let report = ReportBuilder::new(&ds).peer_comparison(true).build();
        let lines = peer_narrative("Customer B", report.peer.as_ref().unwrap());
        assert!(lines.iter().any(|l| l.contains("top 0.0%")), "{:?}", lines);
    }
}
