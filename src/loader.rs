use crate::error::{ReportError, ReportResult};
use crate::types::{BenchmarkRecord, MonthlyRecord, RawBenchmarkRow, RawMonthlyRow};
use crate::util::{is_blank, month_label, parse_date_safe, parse_f64_safe, parse_flag};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const MONTHLY_SOURCE: &str = "monthly collection table";
pub const BENCHMARK_SOURCE: &str = "industry benchmark table";

/// Canonical column name plus the abbreviated spellings found in exports.
const MONTHLY_COLUMNS: &[(&str, &[&str])] = &[
    ("base_date", &[]),
    ("waste_item_group", &[]),
    ("waste_item", &[]),
    ("monthly_amount", &["mnthly_amount"]),
    ("prior_year_monthly_amount", &["ly_mnthly_amount"]),
    ("yoy_growth", &[]),
];

const BENCHMARK_COLUMNS: &[(&str, &[&str])] = &[
    ("customer_company_name", &[]),
    ("waste_item_group", &[]),
    ("waste_item", &[]),
    ("avg_monthly_amount", &["avg_mnthly_amount"]),
    ("is_target_customer", &["tgt_customer_flag"]),
];

/// Everything the report needs, loaded once and never mutated.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub monthly: Vec<MonthlyRecord>,
    pub benchmark_target: Vec<BenchmarkRecord>,
    pub benchmark_competitors: Vec<BenchmarkRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub monthly_rows: usize,
    pub benchmark_rows: usize,
    pub target_rows: usize,
    pub competitor_rows: usize,
    /// Blank amount cells replaced with 0 across both tables.
    pub coerced_nulls: usize,
}

fn check_columns(
    headers: &StringRecord,
    required: &[(&str, &[&str])],
    source_name: &str,
) -> ReportResult<()> {
    let present: Vec<&str> = headers.iter().map(|h| h.trim()).collect();
    let missing: Vec<&str> = required
        .iter()
        .filter(|(name, aliases)| {
            !present.contains(name) && !aliases.iter().any(|a| present.contains(a))
        })
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReportError::format(
            source_name,
            None,
            format!("missing required column(s): {}", missing.join(", ")),
        ))
    }
}

/// Blank means "nothing collected" and becomes 0; anything else must be a
/// non-negative number.
fn parse_amount(
    raw: Option<&str>,
    column: &str,
    source_name: &str,
    line: usize,
    coerced: &mut usize,
) -> ReportResult<f64> {
    if is_blank(raw) {
        *coerced += 1;
        return Ok(0.0);
    }
    match parse_f64_safe(raw) {
        Some(v) if v >= 0.0 => Ok(v),
        Some(v) => Err(ReportError::format(
            source_name,
            Some(line),
            format!("{} must be non-negative, got {}", column, v),
        )),
        None => Err(ReportError::format(
            source_name,
            Some(line),
            format!("{} is not a number: {:?}", column, raw.unwrap_or_default()),
        )),
    }
}

/// Line on which a record starts. Quoted fields may span lines, so this is
/// taken from the reader rather than counted.
fn record_line(record: &StringRecord) -> usize {
    record.position().map(|p| p.line() as usize).unwrap_or(0)
}

fn csv_error(source_name: &str, e: csv::Error) -> ReportError {
    let line = e.position().map(|p| p.line() as usize);
    ReportError::format(source_name, line, e.to_string())
}

fn required_text(
    raw: Option<String>,
    column: &str,
    source_name: &str,
    line: usize,
) -> ReportResult<String> {
    match raw.map(|s| s.trim().to_string()) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ReportError::format(
            source_name,
            Some(line),
            format!("{} is empty", column),
        )),
    }
}

/// Load the monthly collection table. Returns the records and the number of
/// blank amounts that were coerced to 0.
pub fn load_monthly<R: Read>(reader: R) -> ReportResult<(Vec<MonthlyRecord>, usize)> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    check_columns(&headers, MONTHLY_COLUMNS, MONTHLY_SOURCE)?;

    let mut records = Vec::new();
    let mut coerced = 0usize;
    for result in rdr.records() {
        let record = result.map_err(|e| csv_error(MONTHLY_SOURCE, e))?;
        let line = record_line(&record);
        let row: RawMonthlyRow = record
            .deserialize(Some(&headers))
            .map_err(|e| ReportError::format(MONTHLY_SOURCE, Some(line), e.to_string()))?;

        let base_date = parse_date_safe(row.base_date.as_deref()).ok_or_else(|| {
            ReportError::format(
                MONTHLY_SOURCE,
                Some(line),
                format!(
                    "base_date is not a date: {:?}",
                    row.base_date.clone().unwrap_or_default()
                ),
            )
        })?;
        let monthly_amount = parse_amount(
            row.monthly_amount.as_deref(),
            "monthly_amount",
            MONTHLY_SOURCE,
            line,
            &mut coerced,
        )?;
        let prior_year_monthly_amount = parse_amount(
            row.prior_year_monthly_amount.as_deref(),
            "prior_year_monthly_amount",
            MONTHLY_SOURCE,
            line,
            &mut coerced,
        )?;
        // Growth is informational and may legitimately be blank when there
        // was nothing to compare against.
        let yoy_growth = if is_blank(row.yoy_growth.as_deref()) {
            None
        } else {
            Some(parse_f64_safe(row.yoy_growth.as_deref()).ok_or_else(|| {
                ReportError::format(
                    MONTHLY_SOURCE,
                    Some(line),
                    format!(
                        "yoy_growth is not a number: {:?}",
                        row.yoy_growth.clone().unwrap_or_default()
                    ),
                )
            })?)
        };

        records.push(MonthlyRecord {
            base_date,
            month: month_label(base_date),
            waste_item_group: required_text(
                row.waste_item_group,
                "waste_item_group",
                MONTHLY_SOURCE,
                line,
            )?,
            waste_item: required_text(row.waste_item, "waste_item", MONTHLY_SOURCE, line)?,
            monthly_amount,
            prior_year_monthly_amount,
            yoy_growth,
        });
    }
    debug!("monthly: {} rows parsed, {} blank amounts", records.len(), coerced);
    Ok((records, coerced))
}

pub fn load_benchmark<R: Read>(reader: R) -> ReportResult<(Vec<BenchmarkRecord>, usize)> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    check_columns(&headers, BENCHMARK_COLUMNS, BENCHMARK_SOURCE)?;

    let mut records = Vec::new();
    let mut coerced = 0usize;
    for result in rdr.records() {
        let record = result.map_err(|e| csv_error(BENCHMARK_SOURCE, e))?;
        let line = record_line(&record);
        let row: RawBenchmarkRow = record
            .deserialize(Some(&headers))
            .map_err(|e| ReportError::format(BENCHMARK_SOURCE, Some(line), e.to_string()))?;
        let is_target_customer = parse_flag(row.is_target_customer.as_deref()).ok_or_else(|| {
            ReportError::format(
                BENCHMARK_SOURCE,
                Some(line),
                format!(
                    "is_target_customer is not a flag: {:?}",
                    row.is_target_customer.clone().unwrap_or_default()
                ),
            )
        })?;
        let avg_monthly_amount = parse_amount(
            row.avg_monthly_amount.as_deref(),
            "avg_monthly_amount",
            BENCHMARK_SOURCE,
            line,
            &mut coerced,
        )?;
        records.push(BenchmarkRecord {
            customer_company_name: required_text(
                row.customer_company_name,
                "customer_company_name",
                BENCHMARK_SOURCE,
                line,
            )?,
            waste_item_group: required_text(
                row.waste_item_group,
                "waste_item_group",
                BENCHMARK_SOURCE,
                line,
            )?,
            waste_item: required_text(row.waste_item, "waste_item", BENCHMARK_SOURCE, line)?,
            avg_monthly_amount,
            is_target_customer,
        });
    }
    Ok((records, coerced))
}

/// Split benchmark rows into (target, competitors). The target side must not
/// be empty; every comparison downstream is relative to it.
pub fn partition_benchmark(
    rows: Vec<BenchmarkRecord>,
) -> ReportResult<(Vec<BenchmarkRecord>, Vec<BenchmarkRecord>)> {
    let (target, competitors): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|r| r.is_target_customer);
    if target.is_empty() {
        return Err(ReportError::DataConsistency(
            "benchmark table has no target-customer rows".to_string(),
        ));
    }
    Ok((target, competitors))
}

/// Load both sources from readers and partition the benchmark table.
pub fn load_from_readers<M: Read, B: Read>(
    monthly: M,
    benchmark: B,
) -> ReportResult<(Dataset, LoadReport)> {
    let (monthly, monthly_nulls) = load_monthly(monthly)?;
    let (benchmark, benchmark_nulls) = load_benchmark(benchmark)?;
    let benchmark_rows = benchmark.len();
    let (benchmark_target, benchmark_competitors) = partition_benchmark(benchmark)?;

    let report = LoadReport {
        monthly_rows: monthly.len(),
        benchmark_rows,
        target_rows: benchmark_target.len(),
        competitor_rows: benchmark_competitors.len(),
        coerced_nulls: monthly_nulls + benchmark_nulls,
    };
    if report.coerced_nulls > 0 {
        warn!("{} blank amount cells treated as 0 kg", report.coerced_nulls);
    }
    Ok((
        Dataset {
            monthly,
            benchmark_target,
            benchmark_competitors,
        },
        report,
    ))
}

pub fn load_dataset(
    monthly_path: &Path,
    benchmark_path: &Path,
) -> ReportResult<(Dataset, LoadReport)> {
    info!(
        "loading {} and {}",
        monthly_path.display(),
        benchmark_path.display()
    );
    let (dataset, report) =
        load_from_readers(File::open(monthly_path)?, File::open(benchmark_path)?)?;
    info!(
        "loaded {} monthly rows, {} benchmark rows ({} target / {} competitor)",
        report.monthly_rows, report.benchmark_rows, report.target_rows, report.competitor_rows
    );
    Ok((dataset, report))
}
