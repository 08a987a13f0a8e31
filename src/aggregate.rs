// Filtering and aggregation over the monthly collection table.
//
// All functions are pure and return empty outputs for empty inputs; "no data"
// is for the caller to present, not an error.
use crate::types::MonthlyRecord;
use crate::util::{previous_month_start, safe_ratio};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The as-of month for snapshot views: the month before the latest one seen,
/// since the latest month is assumed to be still in progress.
pub fn report_date(monthly: &[MonthlyRecord]) -> Option<NaiveDate> {
    let latest = monthly.iter().map(|r| r.base_date).max()?;
    previous_month_start(latest)
}

/// Distinct waste groups, sorted. This is also the default selection.
pub fn group_options(monthly: &[MonthlyRecord]) -> Vec<String> {
    let set: BTreeSet<&str> = monthly.iter().map(|r| r.waste_item_group.as_str()).collect();
    set.into_iter().map(str::to_string).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "groups")]
pub enum GroupSelection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl GroupSelection {
    pub fn only<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupSelection::Only(groups.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, group: &str) -> bool {
        match self {
            GroupSelection::All => true,
            GroupSelection::Only(set) => set.contains(group),
        }
    }

    /// Resolve to the concrete list of groups given the available options.
    pub fn resolve(&self, options: &[String]) -> Vec<String> {
        options.iter().filter(|g| self.contains(g)).cloned().collect()
    }

    /// Selected names that are not among `options`. They match no rows.
    pub fn unknown(&self, options: &[String]) -> Vec<String> {
        match self {
            GroupSelection::All => Vec::new(),
            GroupSelection::Only(set) => set
                .iter()
                .filter(|g| !options.contains(*g))
                .cloned()
                .collect(),
        }
    }
}

/// Rows whose group is selected and whose date is on or before `report_date`.
pub fn filter_series(
    monthly: &[MonthlyRecord],
    selection: &GroupSelection,
    report_date: NaiveDate,
) -> Vec<MonthlyRecord> {
    monthly
        .iter()
        .filter(|r| selection.contains(&r.waste_item_group) && r.base_date <= report_date)
        .cloned()
        .collect()
}

pub fn report_snapshot(series: &[MonthlyRecord], report_date: NaiveDate) -> Vec<MonthlyRecord> {
    series
        .iter()
        .filter(|r| r.base_date == report_date)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Group,
    Item,
}

impl GroupKey {
    fn of<'a>(&self, r: &'a MonthlyRecord) -> &'a str {
        match self {
            GroupKey::Group => &r.waste_item_group,
            GroupKey::Item => &r.waste_item,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub base_date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySeries {
    pub key: String,
    pub points: Vec<SeriesPoint>,
}

/// Stacked series (one per key) plus the per-date total overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedSeries {
    pub key: GroupKey,
    pub series: Vec<CategorySeries>,
    pub totals: Vec<SeriesPoint>,
}

impl GroupedSeries {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Sum `monthly_amount` per (key, base_date). Keys keep first-seen order so
/// stacking is stable across runs; points are sorted by date.
pub fn group_sum(series: &[MonthlyRecord], key: GroupKey) -> GroupedSeries {
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, BTreeMap<NaiveDate, f64>> = HashMap::new();
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for r in series {
        let k = key.of(r);
        if !sums.contains_key(k) {
            order.push(k.to_string());
        }
        *sums
            .entry(k.to_string())
            .or_default()
            .entry(r.base_date)
            .or_insert(0.0) += r.monthly_amount;
        *totals.entry(r.base_date).or_insert(0.0) += r.monthly_amount;
    }

    let series = order
        .into_iter()
        .map(|k| {
            let points = sums
                .remove(&k)
                .unwrap_or_default()
                .into_iter()
                .map(|(base_date, amount)| SeriesPoint { base_date, amount })
                .collect();
            CategorySeries { key: k, points }
        })
        .collect();

    GroupedSeries {
        key,
        series,
        totals: totals
            .into_iter()
            .map(|(base_date, amount)| SeriesPoint { base_date, amount })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub waste_item_group: String,
    pub waste_item: String,
    /// One cell per entry of `PivotTable::months`.
    pub cells: Vec<f64>,
}

impl PivotRow {
    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PivotTable {
    pub months: Vec<String>,
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, group: &str, item: &str) -> Option<&PivotRow> {
        self.rows
            .iter()
            .find(|r| r.waste_item_group == group && r.waste_item == item)
    }
}

/// (group, item) x month table of summed amounts; absent combinations are 0.
pub fn pivot(series: &[MonthlyRecord]) -> PivotTable {
    let months: Vec<String> = series
        .iter()
        .map(|r| r.month.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let col: HashMap<&str, usize> = months
        .iter()
        .enumerate()
        .map(|(i, m)| (m.as_str(), i))
        .collect();

    let mut cells: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
    for r in series {
        let row = cells
            .entry((r.waste_item_group.clone(), r.waste_item.clone()))
            .or_insert_with(|| vec![0.0; months.len()]);
        if let Some(&i) = col.get(r.month.as_str()) {
            row[i] += r.monthly_amount;
        }
    }

    let rows = cells
        .into_iter()
        .map(|((waste_item_group, waste_item), cells)| PivotRow {
            waste_item_group,
            waste_item,
            cells,
        })
        .collect();
    PivotTable { months, rows }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionRow {
    pub waste_item_group: String,
    pub waste_item: String,
    pub amount: f64,
    pub share_of_group: f64,
    pub share_of_total: f64,
}

/// Report-month breakdown by (group, item) with zero-amount items dropped.
pub fn composition(snapshot: &[MonthlyRecord]) -> Vec<CompositionRow> {
    let mut sums: BTreeMap<(String, String), f64> = BTreeMap::new();
    for r in snapshot {
        *sums
            .entry((r.waste_item_group.clone(), r.waste_item.clone()))
            .or_insert(0.0) += r.monthly_amount;
    }
    sums.retain(|_, v| *v > 0.0);

    let mut group_totals: HashMap<&str, f64> = HashMap::new();
    for ((g, _), v) in &sums {
        *group_totals.entry(g.as_str()).or_insert(0.0) += v;
    }
    let total: f64 = sums.values().sum();

    sums.iter()
        .map(|((g, i), &amount)| CompositionRow {
            waste_item_group: g.clone(),
            waste_item: i.clone(),
            amount,
            share_of_group: safe_ratio(amount, group_totals.get(g.as_str()).copied().unwrap_or(0.0)),
            share_of_total: safe_ratio(amount, total),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::month_label;

    fn rec(date: (i32, u32, u32), group: &str, item: &str, amount: f64) -> MonthlyRecord {
        let base_date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        MonthlyRecord {
            base_date,
            month: month_label(base_date),
            waste_item_group: group.to_string(),
            waste_item: item.to_string(),
            monthly_amount: amount,
            prior_year_monthly_amount: 0.0,
            yoy_growth: None,
        }
    }

    fn sample() -> Vec<MonthlyRecord> {
        vec![
            rec((2024, 9, 1), "Food", "Food waste", 100.0),
            rec((2024, 9, 1), "Plastic", "PET", 20.0),
            rec((2024, 9, 1), "Plastic", "Vinyl", 5.0),
            rec((2024, 10, 1), "Food", "Food waste", 110.0),
            rec((2024, 10, 1), "Plastic", "PET", 25.0),
            rec((2024, 11, 15), "Food", "Food waste", 40.0),
        ]
    }

    #[test]
    fn report_date_is_previous_month_start() {
        assert_eq!(
            report_date(&sample()),
            NaiveDate::from_ymd_opt(2024, 10, 1)
        );
        assert_eq!(report_date(&[]), None);
    }

    #[test]
    fn filter_applies_selection_and_cutoff() {
        let data = sample();
        let rd = report_date(&data).unwrap();
        let series = filter_series(&data, &GroupSelection::only(["Food"]), rd);
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|r| r.waste_item_group == "Food"));
        assert!(series.iter().all(|r| r.base_date <= rd));

        let snap = report_snapshot(&series, rd);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].monthly_amount, 110.0);
    }

    #[test]
    fn unknown_groups_are_listed() {
        let options = group_options(&sample());
        let sel = GroupSelection::only(["Food", "Glas", "Metal"]);
        assert_eq!(sel.unknown(&options), vec!["Glas", "Metal"]);
        assert_eq!(sel.resolve(&options), vec!["Food"]);
        assert!(GroupSelection::All.unknown(&options).is_empty());
    }

    #[test]
    fn empty_selection_yields_empty_outputs() {
        let data = sample();
        let rd = report_date(&data).unwrap();
        let series = filter_series(&data, &GroupSelection::only(Vec::<String>::new()), rd);
        assert!(series.is_empty());
        assert!(group_sum(&series, GroupKey::Group).is_empty());
        assert!(group_sum(&series, GroupKey::Group).totals.is_empty());
        assert!(pivot(&series).is_empty());
        assert!(composition(&report_snapshot(&series, rd)).is_empty());
    }

    #[test]
    fn group_sum_sums_per_key_and_date_with_total_overlay() {
        let data = sample();
        let rd = report_date(&data).unwrap();
        let series = filter_series(&data, &GroupSelection::All, rd);
        let grouped = group_sum(&series, GroupKey::Group);
        assert_eq!(grouped.series.len(), 2);
        assert_eq!(grouped.series[0].key, "Food");
        let plastic = &grouped.series[1];
        assert_eq!(plastic.points[0].amount, 25.0);
        assert_eq!(plastic.points[1].amount, 25.0);
        assert_eq!(grouped.totals.len(), 2);
        assert_eq!(grouped.totals[0].amount, 125.0);
        assert_eq!(grouped.totals[1].amount, 135.0);

        let by_item = group_sum(&series, GroupKey::Item);
        assert_eq!(by_item.series.len(), 3);
    }

    #[test]
    fn pivot_rows_sum_to_series_totals() {
        let data = sample();
        let rd = report_date(&data).unwrap();
        let series = filter_series(&data, &GroupSelection::All, rd);
        let table = pivot(&series);
        assert_eq!(table.months, vec!["2024-09", "2024-10"]);
        for row in &table.rows {
            let expected: f64 = series
                .iter()
                .filter(|r| r.waste_item_group == row.waste_item_group && r.waste_item == row.waste_item)
                .map(|r| r.monthly_amount)
                .sum();
            assert_eq!(row.total(), expected);
        }
        let vinyl = table.row("Plastic", "Vinyl").unwrap();
        assert_eq!(vinyl.cells, vec![5.0, 0.0]);
    }

    #[test]
    fn composition_drops_zero_items_and_computes_shares() {
        let snap = vec![
            rec((2024, 10, 1), "Food", "Food waste", 75.0),
            rec((2024, 10, 1), "Plastic", "PET", 25.0),
            rec((2024, 10, 1), "Plastic", "Vinyl", 0.0),
        ];
        let rows = composition(&snap);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].share_of_total, 0.75);
        assert_eq!(rows[1].share_of_group, 1.0);
    }

    #[test]
    fn selection_resolves_against_options() {
        let opts = group_options(&sample());
        assert_eq!(opts, vec!["Food", "Plastic"]);
        assert_eq!(GroupSelection::All.resolve(&opts), opts);
        assert_eq!(
            GroupSelection::only(["Plastic", "Glass"]).resolve(&opts),
            vec!["Plastic"]
        );
    }
}
