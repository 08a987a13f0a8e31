// Entry point and high-level CLI flow.
//
// - Option [1] loads both CSV files (memoized in the dataset cache).
// - Option [2] picks the waste groups to include.
// - Option [3] builds the report, exports CSV/JSON and prints previews.
// - After generating, the user can go back to the menu or exit.
//
// `--batch` skips the menu: load, generate, export, exit.
use anyhow::{Context, Result};
use eco_report::aggregate::group_options;
use eco_report::cache::{DatasetCache, SourceKey};
use eco_report::config::{arg_value, parse_group_list, ReportConfig};
use eco_report::output;
use eco_report::reports::{self, EcoReport, ReportBuilder};
use eco_report::util::{format_int, format_number};
use log::{error, info};
use once_cell::sync::Lazy;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

// Session state: the loaded datasets stay cached across report runs until
// the user reloads.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        cache: DatasetCache::new(),
        loaded: None,
    })
});

struct AppState {
    cache: DatasetCache,
    loaded: Option<SourceKey>,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read a single line of input after printing `prompt`. `None` once the
/// input is exhausted or unreadable.
fn read_line<R: BufRead>(input: &mut R, prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask whether to go back to the menu after generating a report. End of
/// input counts as "N".
fn prompt_back_to_menu<R: BufRead>(input: &mut R) -> bool {
    while let Some(answer) = read_line(input, "Back to Report Selection (Y/N): ") {
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
    false
}

/// Handle option [1]: (re)load both sources. An explicit reload drops the
/// cached copy first so edited files are picked up.
fn handle_load(cfg: &ReportConfig) {
    let key = SourceKey::new(&cfg.monthly_path, &cfg.benchmark_path);
    let mut st = state();
    st.cache.invalidate(&key);
    match st.cache.get_or_load(&key) {
        Ok(cached) => {
            let r = &cached.report;
            println!(
                "Processing dataset... ({} monthly rows, {} benchmark rows: {} target / {} peer)",
                format_int(r.monthly_rows),
                format_int(r.benchmark_rows),
                format_int(r.target_rows),
                format_int(r.competitor_rows)
            );
            if r.coerced_nulls > 0 {
                println!(
                    "Note: {} blank amounts treated as 0 kg.",
                    format_int(r.coerced_nulls)
                );
            }
            println!();
            st.loaded = Some(key);
        }
        Err(e) => {
            error!("load failed: {}", e);
            eprintln!("Failed to load files: {}\n", e);
        }
    }
}

/// Handle option [2]: choose waste groups. Blank input selects all.
fn handle_select_groups<R: BufRead>(input: &mut R, cfg: &mut ReportConfig) {
    let options = {
        let st = state();
        let Some(key) = st.loaded.clone() else {
            println!("Error: No data loaded. Please load the files first (option 1).\n");
            return;
        };
        match st.cache.get(&key) {
            Some(cached) => group_options(&cached.dataset.monthly),
            None => Vec::new(),
        }
    };
    println!("Available waste groups: {}", options.join(", "));
    let Some(line) = read_line(input, "Groups (comma-separated, blank = all): ") else {
        println!();
        return;
    };
    let groups = parse_group_list(&line);
    cfg.groups = if groups.is_empty() { None } else { Some(groups) };
    match &cfg.groups {
        None => println!("Selected: all groups\n"),
        Some(g) => {
            let unknown: Vec<&str> = g
                .iter()
                .filter(|name| !options.contains(*name))
                .map(String::as_str)
                .collect();
            if !unknown.is_empty() {
                println!("Warning: not found in the data: {}", unknown.join(", "));
            }
            println!("Selected: {}\n", g.join(", "));
        }
    }
}

fn print_report(cfg: &ReportConfig, report: &EcoReport) {
    let n = cfg.preview_rows;
    println!(
        "{} | ESG report as of {}",
        report.customer_label,
        if report.report_month.is_empty() { "-" } else { report.report_month.as_str() }
    );
    let k = &report.impact;
    println!(
        "Impact ({}): CO2 -{} {} | water saved {} m3 | energy recovered {} MWh | {} pine trees | {} cars\n",
        k.period_label,
        format_number(k.co2_reduction, 1),
        k.co2_unit,
        format_number(k.water_saved, 2),
        format_number(k.energy_recovered, 0),
        format_int(k.pine_tree_equivalent),
        format_int(k.passenger_car_equivalent)
    );

    if !report.unknown_groups.is_empty() {
        println!(
            "Warning: waste group(s) not found in the data: {}\n",
            report.unknown_groups.join(", ")
        );
    }

    if !report.has_data() {
        println!("No data for the selected filter.\n");
        return;
    }

    println!("Waste composition ({})\n", report.report_month);
    output::preview_table_rows(&reports::composition_table(&report.composition), n);

    println!("Monthly collection by item (kg)\n");
    match output::render_pivot(&report.pivot, n) {
        Some(t) => println!("{}\n", t),
        None => println!("(no rows)\n"),
    }

    println!("Year-over-year ({})", report.report_month);
    if report.yoy.is_empty() {
        println!("No prior-year data to compare against.\n");
    } else {
        println!("Total: {}\n", reports::yoy_headline(&report.yoy.total));
        output::preview_table_rows(&reports::yoy_table(&report.yoy), n);
    }

    if let Some(peer) = &report.peer {
        println!("Peer comparison\n");
        for line in reports::peer_narrative(&report.customer_label, peer) {
            println!("{}", line);
        }
        println!();
        output::preview_table_rows(&reports::percentile_table(peer), n);
    }
}

/// Handle option [3]: build, export and preview the report.
fn handle_generate(cfg: &ReportConfig) -> Result<()> {
    let cached = {
        let mut st = state();
        let key = st
            .loaded
            .clone()
            .unwrap_or_else(|| SourceKey::new(&cfg.monthly_path, &cfg.benchmark_path));
        let cached = st.cache.get_or_load(&key)?;
        st.loaded = Some(key);
        cached
    };

    let report = ReportBuilder::from_config(&cached.dataset, cfg).build();
    let written = output::export_report(&cfg.output_dir, &report)
        .with_context(|| format!("writing outputs to {}", cfg.output_dir.display()))?;
    print_report(cfg, &report);
    println!("(Full tables exported: {} files in {})\n", written.len(), cfg.output_dir.display());
    Ok(())
}

fn load_config(args: &[String]) -> Result<ReportConfig> {
    let mut cfg = match arg_value(args, "--config") {
        Some(p) => ReportConfig::load(Path::new(p)).with_context(|| format!("reading config {}", p))?,
        None => ReportConfig::default(),
    };
    cfg.apply_args(args)?;
    Ok(cfg)
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let mut cfg = load_config(&args)?;
    info!(
        "monthly={} benchmark={} out={}",
        cfg.monthly_path.display(),
        cfg.benchmark_path.display(),
        cfg.output_dir.display()
    );

    if args.iter().any(|a| a == "--batch") {
        return handle_generate(&cfg);
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        println!("ESG Report Menu:");
        println!("[1] Load the files");
        println!("[2] Select waste groups");
        println!("[3] Generate report\n");
        let Some(choice) = read_line(&mut input, "Enter choice: ") else {
            println!();
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&cfg),
            "2" => handle_select_groups(&mut input, &mut cfg),
            "3" => {
                println!();
                if let Err(e) = handle_generate(&cfg) {
                    eprintln!("Report failed: {:#}\n", e);
                    continue;
                }
                if !prompt_back_to_menu(&mut input) {
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1, 2 or 3.\n"),
        }
    }
    println!("Exiting the program.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_line_is_none_at_end_of_input() {
        let mut input: &[u8] = b"  3 \n";
        assert_eq!(read_line(&mut input, ""), Some("3".to_string()));
        assert_eq!(read_line(&mut input, ""), None);
    }

    #[test]
    fn back_to_menu_prompt_exits_when_input_runs_out() {
        assert!(!prompt_back_to_menu(&mut io::empty()));
        let mut input: &[u8] = b"maybe\n";
        assert!(!prompt_back_to_menu(&mut input));
    }

    #[test]
    fn back_to_menu_prompt_retries_until_answered() {
        let mut input: &[u8] = b"x\ny\n";
        assert!(prompt_back_to_menu(&mut input));
        let mut input: &[u8] = b"N\n";
        assert!(!prompt_back_to_menu(&mut input));
    }

    #[test]
    fn group_prompt_keeps_selection_at_end_of_input() {
        let mut cfg = ReportConfig::default();
        cfg.groups = Some(vec!["Food".to_string()]);
        // No data is loaded, so the prompt returns before reading.
        handle_select_groups(&mut io::empty(), &mut cfg);
        assert_eq!(cfg.groups, Some(vec!["Food".to_string()]));
    }
}
