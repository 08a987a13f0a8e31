// Year-over-year comparison for the report month.
//
// Only items with a prior-year baseline are compared. Rows are ordered by the
// reported growth, largest decrease first, and the waterfall steps are derived
// from the same rows.
use crate::types::MonthlyRecord;
use crate::util::safe_ratio;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YoyRow {
    pub waste_item_group: String,
    pub waste_item: String,
    pub prior_year_monthly_amount: f64,
    pub monthly_amount: f64,
    pub delta: f64,
    /// Growth exactly as the source reported it.
    pub yoy_growth: Option<f64>,
    /// `delta / prior_year_monthly_amount`, computed here. Kept next to the
    /// source figure; the two are not reconciled.
    pub derived_growth: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YoyTotal {
    pub total_ly: f64,
    pub total_ty: f64,
    pub total_delta: f64,
    /// `total_delta / total_ly`, or exactly 0 when `total_ly` is 0.
    pub total_growth: f64,
}

impl YoyTotal {
    pub fn from_rows(rows: &[YoyRow]) -> Self {
        let total_ly: f64 = rows.iter().map(|r| r.prior_year_monthly_amount).sum();
        let total_ty: f64 = rows.iter().map(|r| r.monthly_amount).sum();
        let total_delta = total_ty - total_ly;
        YoyTotal {
            total_ly,
            total_ty,
            total_delta,
            total_growth: safe_ratio(total_delta, total_ly),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YoyComparison {
    /// Canonical presentation order: ascending by source growth, most
    /// decreased first. Rows without a source growth go last.
    pub rows: Vec<YoyRow>,
    pub total: YoyTotal,
}

impl YoyComparison {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn growth_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compare each snapshot row against the same item one year earlier.
///
/// Items with no prior-year baseline (`prior_year_monthly_amount == 0`) are
/// left out: a ratio against nothing is meaningless.
pub fn compare_year_over_year(snapshot: &[MonthlyRecord]) -> YoyComparison {
    let mut rows: Vec<YoyRow> = snapshot
        .iter()
        .filter(|r| r.prior_year_monthly_amount > 0.0)
        .map(|r| {
            let delta = r.monthly_amount - r.prior_year_monthly_amount;
            let direction = if r.yoy_growth.unwrap_or(delta) > 0.0 {
                Direction::Increase
            } else {
                Direction::Decrease
            };
            YoyRow {
                waste_item_group: r.waste_item_group.clone(),
                waste_item: r.waste_item.clone(),
                prior_year_monthly_amount: r.prior_year_monthly_amount,
                monthly_amount: r.monthly_amount,
                delta,
                yoy_growth: r.yoy_growth,
                derived_growth: safe_ratio(delta, r.prior_year_monthly_amount),
                direction,
            }
        })
        .collect();
    // Stable sort: equal growth keeps snapshot order.
    rows.sort_by(|a, b| growth_order(a.yoy_growth, b.yoy_growth));
    let total = YoyTotal::from_rows(&rows);
    YoyComparison { rows, total }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMeasure {
    Absolute,
    Relative,
    Total,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterfallStep {
    pub label: String,
    pub measure: StepMeasure,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waterfall {
    pub steps: Vec<WaterfallStep>,
    /// Suggested value-axis range, padded by the net change on both sides.
    pub axis_min: f64,
    pub axis_max: f64,
}

pub const LAST_YEAR_LABEL: &str = "Last year total";
pub const THIS_YEAR_LABEL: &str = "This year total";

/// Bridge from last year's total to this year's, one step per item in
/// canonical order. `None` when there is nothing to compare.
pub fn waterfall(cmp: &YoyComparison) -> Option<Waterfall> {
    if cmp.is_empty() {
        return None;
    }
    let t = cmp.total;
    let mut steps = Vec::with_capacity(cmp.rows.len() + 2);
    steps.push(WaterfallStep {
        label: LAST_YEAR_LABEL.to_string(),
        measure: StepMeasure::Absolute,
        value: t.total_ly,
    });
    steps.extend(cmp.rows.iter().map(|r| WaterfallStep {
        label: r.waste_item.clone(),
        measure: StepMeasure::Relative,
        value: r.delta,
    }));
    steps.push(WaterfallStep {
        label: THIS_YEAR_LABEL.to_string(),
        measure: StepMeasure::Total,
        value: t.total_ty,
    });

    let d = (t.total_ly - t.total_ty).abs();
    Some(Waterfall {
        steps,
        axis_min: t.total_ly.min(t.total_ty) - d,
        axis_max: t.total_ly.max(t.total_ty) + d,
    })
}
