use crate::aggregate::{GroupedSeries, PivotTable};
use crate::error::ReportResult;
use crate::reports::EcoReport;
use crate::util::format_number;
use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> ReportResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ReportResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Long-format row for stacked series exports: one line per key and date,
/// with the total overlay under the key `"Total"`.
#[derive(Debug, Serialize)]
struct SeriesCsvRow<'a> {
    key: &'a str,
    base_date: NaiveDate,
    monthly_amount: f64,
}

pub const TOTAL_KEY: &str = "Total";

fn series_rows(grouped: &GroupedSeries) -> Vec<SeriesCsvRow<'_>> {
    let mut rows: Vec<SeriesCsvRow> = grouped
        .series
        .iter()
        .flat_map(|s| {
            s.points.iter().map(move |p| SeriesCsvRow {
                key: &s.key,
                base_date: p.base_date,
                monthly_amount: p.amount,
            })
        })
        .collect();
    rows.extend(grouped.totals.iter().map(|p| SeriesCsvRow {
        key: TOTAL_KEY,
        base_date: p.base_date,
        monthly_amount: p.amount,
    }));
    rows
}

/// The pivot's columns are only known at runtime, so it is written record by
/// record instead of through `serialize`.
pub fn write_pivot_csv(path: &Path, table: &PivotTable) -> ReportResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec!["waste_item_group".to_string(), "waste_item".to_string()];
    header.extend(table.months.iter().cloned());
    wtr.write_record(&header)?;
    for row in &table.rows {
        let mut rec = vec![row.waste_item_group.clone(), row.waste_item.clone()];
        rec.extend(row.cells.iter().map(|c| c.to_string()));
        wtr.write_record(&rec)?;
    }
    wtr.flush()?;
    Ok(())
}

pub const COMPOSITION_FILE: &str = "composition.csv";
pub const SERIES_BY_GROUP_FILE: &str = "series_by_group.csv";
pub const SERIES_BY_ITEM_FILE: &str = "series_by_item.csv";
pub const PIVOT_FILE: &str = "pivot.csv";
pub const YOY_FILE: &str = "yoy.csv";
pub const PERCENTILE_FILE: &str = "peer_percentiles.csv";
pub const REPORT_JSON_FILE: &str = "eco_report.json";

/// Write every tabular output plus the full JSON report into `dir`.
/// Empty sections still get a file so downstream tooling sees a stable set.
pub fn export_report(dir: &Path, report: &EcoReport) -> ReportResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let p = dir.join(COMPOSITION_FILE);
    write_csv(&p, &report.composition)?;
    written.push(p);

    let p = dir.join(SERIES_BY_GROUP_FILE);
    write_csv(&p, &series_rows(&report.by_group))?;
    written.push(p);

    let p = dir.join(SERIES_BY_ITEM_FILE);
    write_csv(&p, &series_rows(&report.by_item))?;
    written.push(p);

    let p = dir.join(PIVOT_FILE);
    write_pivot_csv(&p, &report.pivot)?;
    written.push(p);

    let p = dir.join(YOY_FILE);
    write_csv(&p, &report.yoy.rows)?;
    written.push(p);

    if let Some(peer) = &report.peer {
        let p = dir.join(PERCENTILE_FILE);
        write_csv(&p, &peer.percentiles)?;
        written.push(p);
    }

    let p = dir.join(REPORT_JSON_FILE);
    write_json(&p, report)?;
    written.push(p);

    info!("exported {} files to {}", written.len(), dir.display());
    Ok(written)
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

pub fn render_pivot(table: &PivotTable, max_rows: usize) -> Option<String> {
    if table.is_empty() {
        return None;
    }
    let mut builder = Builder::default();
    let mut header = vec!["Group".to_string(), "Item".to_string()];
    header.extend(table.months.iter().cloned());
    builder.push_record(header);
    for row in table.rows.iter().take(max_rows) {
        let mut rec = vec![row.waste_item_group.clone(), row.waste_item.clone()];
        rec.extend(row.cells.iter().map(|c| format_number(*c, 0)));
        builder.push_record(rec);
    }
    Some(builder.build().with(Style::markdown()).to_string())
}
