// End-to-end tests: CSV files on disk through loader, cache, report builder
// and exports.

use chrono::NaiveDate;
use eco_report::aggregate::{GroupKey, GroupSelection};
use eco_report::cache::{DatasetCache, SourceKey};
use eco_report::config::ReportConfig;
use eco_report::loader::load_dataset;
use eco_report::output::{self, PIVOT_FILE, REPORT_JSON_FILE, YOY_FILE};
use eco_report::peer::percentile_rank;
use eco_report::reports::ReportBuilder;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const MONTHLY: &str = "\
base_date,waste_item_group,waste_item,mnthly_amount,ly_mnthly_amount,yoy_growth
2024-09-01,Food,Food waste,1000,900,0.1111
2024-09-01,Plastic,PET,200,,
2024-10-01,Food,Food waste,1100,1000,0.1
2024-10-01,Plastic,PET,100,0,
2024-10-01,Plastic,Vinyl,60,80,-0.25
2024-11-15,Food,Food waste,300,,
";

const BENCHMARK: &str = "\
customer_company_name,waste_item_group,waste_item,avg_mnthly_amount,tgt_customer_flag
Customer B,Food,Food waste,20,1
Customer B,Plastic,PET,5,1
Peer A,Food,Food waste,10,0
Peer B,Food,Food waste,20,0
Peer C,Food,Food waste,30,0
Peer A,Plastic,PET,7,0
";

fn write_fixtures() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let monthly = dir.path().join("monthly.csv");
    let benchmark = dir.path().join("benchmark.csv");
    fs::write(&monthly, MONTHLY).expect("write monthly");
    fs::write(&benchmark, BENCHMARK).expect("write benchmark");
    (dir, monthly, benchmark)
}

#[test]
fn report_month_lags_latest_date_by_one_month() {
    let (_dir, monthly, benchmark) = write_fixtures();
    let (ds, load) = load_dataset(&monthly, &benchmark).unwrap();
    assert_eq!(load.monthly_rows, 6);
    assert_eq!(load.coerced_nulls, 2);
    assert!(ds
        .monthly
        .iter()
        .all(|r| r.monthly_amount >= 0.0 && r.prior_year_monthly_amount >= 0.0));

    let report = ReportBuilder::new(&ds).build();
    assert_eq!(report.report_date, NaiveDate::from_ymd_opt(2024, 10, 1));
    assert_eq!(report.report_month, "2024-10");
    assert!(report.series.iter().all(|r| r.month != "2024-11"));
}

#[test]
fn filter_removes_unselected_category() {
    let (_dir, monthly, benchmark) = write_fixtures();
    let (ds, _) = load_dataset(&monthly, &benchmark).unwrap();
    let report = ReportBuilder::new(&ds)
        .groups(GroupSelection::only(["Food"]))
        .build();
    assert!(report.series.iter().all(|r| r.waste_item_group == "Food"));
    assert_eq!(report.by_group.key, GroupKey::Group);
    assert_eq!(report.by_group.series.len(), 1);
    assert_eq!(report.selected_groups, vec!["Food"]);
}

#[test]
fn yoy_skips_items_without_prior_year_baseline() {
    let (_dir, monthly, benchmark) = write_fixtures();
    let (ds, _) = load_dataset(&monthly, &benchmark).unwrap();
    let report = ReportBuilder::new(&ds).build();

    // PET has 100 kg this year but nothing last year.
    assert!(report.yoy.rows.iter().all(|r| r.waste_item != "PET"));
    let items: Vec<&str> = report.yoy.rows.iter().map(|r| r.waste_item.as_str()).collect();
    assert_eq!(items, vec!["Vinyl", "Food waste"]);
    assert_eq!(report.yoy.total.total_ly, 1080.0);
    assert_eq!(report.yoy.total.total_ty, 1160.0);
    assert_eq!(report.yoy.total.total_delta, 80.0);
}

#[test]
fn pivot_rows_match_series_sums() {
    let (_dir, monthly, benchmark) = write_fixtures();
    let (ds, _) = load_dataset(&monthly, &benchmark).unwrap();
    let report = ReportBuilder::new(&ds).build();
    for row in &report.pivot.rows {
        let expected: f64 = report
            .series
            .iter()
            .filter(|r| r.waste_item_group == row.waste_item_group && r.waste_item == row.waste_item)
            .map(|r| r.monthly_amount)
            .sum();
        assert_eq!(row.total(), expected);
    }
    assert_eq!(report.pivot.row("Plastic", "Vinyl").unwrap().cells, vec![0.0, 60.0]);
}

#[test]
fn peer_section_skips_items_with_a_single_competitor() {
    let (_dir, monthly, benchmark) = write_fixtures();
    let (ds, _) = load_dataset(&monthly, &benchmark).unwrap();
    let report = ReportBuilder::new(&ds).peer_comparison(true).build();
    let peer = report.peer.unwrap();
    assert_eq!(peer.percentiles.len(), 1);
    assert_eq!(peer.percentiles[0].waste_item, "Food waste");
    assert_eq!(peer.percentiles[0].percentile, 50.0);
    assert_eq!(percentile_rank(&[10.0, 20.0, 30.0], 20.0), 50.0);
    let reference = peer.reference.unwrap();
    assert_eq!(reference.waste_item, "Food waste");
    assert_eq!(reference.z_score, 0.0);
}

#[test]
fn cache_serves_repeat_loads_until_invalidated() {
    let (_dir, monthly, benchmark) = write_fixtures();
    let mut cache = DatasetCache::new();
    let key = SourceKey::new(&monthly, &benchmark);
    let first = cache.get_or_load(&key).unwrap();

    // Edits are not seen until the entry is invalidated.
    fs::write(&monthly, MONTHLY.replace("1100", "1200")).unwrap();
    let second = cache.get_or_load(&key).unwrap();
    assert_eq!(first.dataset.monthly, second.dataset.monthly);

    assert!(cache.invalidate(&key));
    let third = cache.get_or_load(&key).unwrap();
    assert!(third.dataset.monthly.iter().any(|r| r.monthly_amount == 1200.0));
}

#[test]
fn missing_file_is_an_io_error_and_missing_target_is_consistency_error() {
    let (dir, monthly, _) = write_fixtures();
    let missing = dir.path().join("nope.csv");
    assert!(load_dataset(&monthly, &missing).is_err());

    let no_target = dir.path().join("no_target.csv");
    fs::write(
        &no_target,
        "customer_company_name,waste_item_group,waste_item,avg_monthly_amount,is_target_customer\nPeer A,Food,Food waste,10,0\n",
    )
    .unwrap();
    let err = load_dataset(&monthly, &no_target).unwrap_err();
    assert!(err.is_data_consistency());
}

#[test]
fn export_writes_csv_and_json_outputs() {
    let (dir, monthly, benchmark) = write_fixtures();
    let (ds, _) = load_dataset(&monthly, &benchmark).unwrap();
    let mut cfg = ReportConfig::default();
    cfg.include_peer_comparison = true;
    cfg.customer_label = "Customer B".to_string();
    let report = ReportBuilder::from_config(&ds, &cfg).build();

    let out = dir.path().join("out");
    let written = output::export_report(&out, &report).unwrap();
    assert_eq!(written.len(), 7);

    let pivot = fs::read_to_string(out.join(PIVOT_FILE)).unwrap();
    assert!(pivot.starts_with("waste_item_group,waste_item,2024-09,2024-10"));

    let yoy = fs::read_to_string(out.join(YOY_FILE)).unwrap();
    assert!(yoy.lines().next().unwrap().contains("derived_growth"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(REPORT_JSON_FILE)).unwrap()).unwrap();
    assert_eq!(json["report_month"], "2024-10");
    assert_eq!(json["customer_label"], "Customer B");
    assert!(json["peer"].is_object());
}

#[test]
fn empty_selection_exports_empty_sections_without_error() {
    let (dir, monthly, benchmark) = write_fixtures();
    let (ds, _) = load_dataset(&monthly, &benchmark).unwrap();
    let report = ReportBuilder::new(&ds)
        .groups(GroupSelection::only(Vec::<String>::new()))
        .build();
    assert!(!report.has_data());
    assert!(report.yoy.is_empty());
    assert!(report.composition.is_empty());
    let written = output::export_report(&dir.path().join("empty"), &report).unwrap();
    assert_eq!(written.len(), 6);
}

#[test]
fn unknown_groups_are_reported_and_select_nothing() {
    let (_dir, monthly, benchmark) = write_fixtures();
    let (ds, _) = load_dataset(&monthly, &benchmark).unwrap();
    let report = ReportBuilder::new(&ds)
        .groups(GroupSelection::only(["Food", "Glass"]))
        .build();
    assert_eq!(report.unknown_groups, vec!["Glass"]);
    assert_eq!(report.selected_groups, vec!["Food"]);
    assert!(report.series.iter().all(|r| r.waste_item_group == "Food"));
}
