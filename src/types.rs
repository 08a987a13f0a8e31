use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// One raw CSV row of the monthly collection table, before cleaning.
///
/// Every cell is read as text so the loader can decide what a blank means
/// per column (zero for amounts, absent for growth, fatal for dates).
#[derive(Debug, Deserialize)]
pub struct RawMonthlyRow {
    pub base_date: Option<String>,
    pub waste_item_group: Option<String>,
    pub waste_item: Option<String>,
    #[serde(alias = "mnthly_amount")]
    pub monthly_amount: Option<String>,
    #[serde(alias = "ly_mnthly_amount")]
    pub prior_year_monthly_amount: Option<String>,
    pub yoy_growth: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawBenchmarkRow {
    pub customer_company_name: Option<String>,
    pub waste_item_group: Option<String>,
    pub waste_item: Option<String>,
    #[serde(alias = "avg_mnthly_amount")]
    pub avg_monthly_amount: Option<String>,
    #[serde(alias = "tgt_customer_flag")]
    pub is_target_customer: Option<String>,
}

/// One row per customer x waste item x month, amounts in kilograms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRecord {
    pub base_date: NaiveDate,
    /// `YYYY-MM` label derived from `base_date`.
    pub month: String,
    pub waste_item_group: String,
    pub waste_item: String,
    pub monthly_amount: f64,
    pub prior_year_monthly_amount: f64,
    /// Growth ratio as provided by the source; `None` when the cell is blank.
    pub yoy_growth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkRecord {
    pub customer_company_name: String,
    pub waste_item_group: String,
    pub waste_item: String,
    pub avg_monthly_amount: f64,
    pub is_target_customer: bool,
}

// Console preview rows. Numbers are pre-formatted like the exported tables.

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CompositionTableRow {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Item")]
    pub item: String,
    #[tabled(rename = "Amount (kg)")]
    pub amount: String,
    #[tabled(rename = "Share of Group")]
    pub share_of_group: String,
    #[tabled(rename = "Share of Total")]
    pub share_of_total: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct YoyTableRow {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Item")]
    pub item: String,
    #[tabled(rename = "Last Year (kg)")]
    pub prior: String,
    #[tabled(rename = "This Year (kg)")]
    pub current: String,
    #[tabled(rename = "Delta (kg)")]
    pub delta: String,
    #[tabled(rename = "YoY Growth")]
    pub yoy_growth: String,
    #[tabled(rename = "Derived Growth")]
    pub derived_growth: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PercentileTableRow {
    #[tabled(rename = "Item")]
    pub item: String,
    #[tabled(rename = "Target (kg/mo)")]
    pub target_value: String,
    #[tabled(rename = "Peers")]
    pub peer_count: usize,
    #[tabled(rename = "Peer Mean (kg/mo)")]
    pub peer_mean: String,
    #[tabled(rename = "Percentile")]
    pub percentile: String,
    #[tabled(rename = "Top")]
    pub top_share: String,
}
