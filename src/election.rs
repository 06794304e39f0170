use log::{debug, info, warn};

use council_ballot::protocol::*;
use council_ballot::session::VotingSession;
use council_ballot::*;
use snafu::{prelude::*, ErrorCompat, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::election::config_reader::*;
use crate::election::store::LocalBackend;

pub mod config_reader;
mod io_csv;
mod io_roster;
mod store;

#[derive(Debug, Snafu)]
pub enum ElectionError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Missing parent directory for {path}"))]
    MissingParentDir { path: String },

    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet found in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Column {name} not found in the header of {path}"))]
    MissingColumn { name: String, path: String },
    #[snafu(display("Line {lineno}: could not understand cell {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },

    #[snafu(display("Error writing CSV"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("Error flushing CSV"))]
    CsvFlush { source: std::io::Error },

    #[snafu(display("Invalid election data: {source}"))]
    InvalidData { source: BallotErrors },
    #[snafu(display("{source}"))]
    Backend { source: BackendError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ElectionResult<T> = Result<T, ElectionError>;

/// What a replay did, for the caller to inspect.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReplayReport {
    /// The messages shown to the voter, in click order.
    pub messages: Vec<String>,
    pub view: Vec<CandidateView>,
    pub summary: SelectionSummary,
    /// The confirmation message, if the selection was submitted.
    pub submitted: Option<String>,
}

fn build_summary_js(
    config: &ElectionConfig,
    limits: &SelectionLimits,
    results: &ResultsResponse,
) -> JSValue {
    let c = config.output_settings.output_config();
    let turnout = if results.is_open {
        json!("Elections in Progress")
    } else {
        match config
            .rules
            .eligible_voters
            .and_then(|e| results.turnout_percent(e))
        {
            Some(pct) => json!(format!("{}%", pct)),
            None => JSValue::Null,
        }
    };
    let officers: Vec<String> = results
        .executive_officers(limits.executive_seats())
        .iter()
        .map(|r| r.name.clone())
        .collect();
    json!({
        "config": c,
        "executiveOfficers": officers,
        "isOpen": results.is_open,
        "message": results.message,
        "results": results.results,
        "stats": results.stats,
        "turnout": turnout
    })
}

fn write_output(out: &Option<String>, content: &str) -> ElectionResult<()> {
    match out.as_deref() {
        None | Some("") | Some("stdout") => {
            print!("{}", content);
            Ok(())
        }
        Some(path) => {
            info!("Writing output to {}", path);
            fs::write(path, content).context(WritingFileSnafu { path })
        }
    }
}

fn open_backend(config_path: &str) -> ElectionResult<(ElectionConfig, LocalBackend)> {
    let (config, root) = read_config(config_path)?;
    let backend = LocalBackend::open(&config, &root)?;
    Ok((config, backend))
}

pub fn run_tally(
    config_path: &str,
    out: Option<String>,
    check_summary_path: Option<String>,
) -> ElectionResult<()> {
    let (config, mut backend) = open_backend(config_path)?;
    let results = backend.results().context(BackendSnafu {})?;
    info!("results {:?}", results);

    // Assemble the final json
    let result_js = build_summary_js(&config, backend.ballot_box().limits(), &results);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(WritingJsonSnafu {})?;
    write_output(&out, format!("{}\n", pretty_js_stats).as_str())?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(&summary_p)?;
        debug!("summary: {:?}", summary_ref);
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(WritingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }
    Ok(())
}

fn print_view(roster: &Roster, views: &[CandidateView]) {
    for (c, v) in roster.candidates().iter().zip(views.iter()) {
        let mark = if v.executive {
            "E"
        } else if v.selected {
            "x"
        } else {
            " "
        };
        let badge = v
            .badge_number
            .map(|b| format!(" #{}", b))
            .unwrap_or_default();
        println!(
            "[{}] {:>3} {} - {} ({}){}",
            mark,
            c.id,
            c.name,
            c.position,
            c.activity_level(),
            badge
        );
    }
}

pub fn run_replay(config_path: &str, clicks: &[u32], submit: bool) -> ElectionResult<ReplayReport> {
    let (_, mut backend) = open_backend(config_path)?;
    let limits = *backend.ballot_box().limits();
    let mut session = VotingSession::start(&mut backend, limits).context(BackendSnafu {})?;
    let auth = backend.demo_login().context(BackendSnafu {})?;
    info!("{}", auth.message);
    session.authenticate(auth.user);

    let mut messages: Vec<String> = Vec::new();
    for id in clicks.iter() {
        if let Some(msg) = session.toggle(CandidateId(*id)) {
            println!("click {}: {}", id, msg);
            messages.push(msg.to_string());
        }
    }

    let view = session.render();
    let summary = session.summary();
    print_view(session.roster(), &view);
    println!(
        "council: {}/{} executive: {}/{} ready: {}",
        summary.selected_count,
        limits.council_seats(),
        summary.executive_count,
        limits.executive_seats(),
        summary.can_submit
    );

    let submitted = if submit {
        match session.submit(&mut backend) {
            Ok(resp) => {
                println!("{}", resp.message);
                Some(resp.message)
            }
            Err(e) => {
                whatever!("Submission failed: {}", e)
            }
        }
    } else {
        None
    };

    Ok(ReplayReport {
        messages,
        view,
        summary,
        submitted,
    })
}

pub fn run_toggle_status(config_path: &str, password: &str) -> ElectionResult<AdminToggleResponse> {
    let (_, mut backend) = open_backend(config_path)?;
    let auth = backend
        .authenticate_admin(password)
        .context(BackendSnafu {})?;
    info!("{}", auth.message);
    let resp = backend.toggle_election_status().context(BackendSnafu {})?;
    println!("{}", resp.message);
    Ok(resp)
}

/// Exports the ballots. Only the administrator may read them.
pub fn run_export(
    config_path: &str,
    password: &str,
    format: Option<String>,
    out: Option<String>,
) -> ElectionResult<()> {
    let (_, mut backend) = open_backend(config_path)?;
    backend
        .authenticate_admin(password)
        .context(BackendSnafu {})?;
    let content = match format.as_deref().unwrap_or("csv") {
        "csv" => io_csv::votes_to_csv(backend.ballot_box())?,
        "json" => {
            let js = serde_json::to_string_pretty(backend.ballot_box().votes())
                .context(WritingJsonSnafu {})?;
            format!("{}\n", js)
        }
        x => whatever!("Export format not implemented {:?}", x),
    };
    write_output(&out, &content)
}

#[cfg(test)]
fn test_dir() -> PathBuf {
    match option_env!("COUNCILVOTE_TEST_DIR") {
        Some(p) => PathBuf::from(p),
        None => Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data"),
    }
}

#[cfg(test)]
fn run_election_test(test_name: &str, config_lpath: &str, summary_lpath: &str) {
    let dir = test_dir().join(test_name);
    info!("Running test {}", test_name);
    let res = run_tally(
        dir.join(config_lpath).display().to_string().as_str(),
        None,
        Some(dir.join(summary_lpath).display().to_string()),
    );
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        } else {
            eprintln!("No trace found");
        }
        panic!("test {} failed: {}", test_name, e);
    }
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) {
    run_election_test(
        test_name,
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected_summary.json", test_name).as_str(),
    )
}
