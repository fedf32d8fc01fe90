//! Command-line entry point.
//!
//! ```text
//! sargassum_service compute [--run ID] [--simulate] [--config PATH]
//! sargassum_service report  [--day N | --beach NAME] [--json] [--config PATH]
//! ```
//!
//! Exit status: 0 on full success, 1 when any record failed to persist (or
//! there was nothing to score), 2 on configuration, usage, or connection
//! errors.

use chrono::Utc;
use sargassum_service::config::ServiceConfig;
use sargassum_service::db;
use sargassum_service::logging::{self, Component};
use sargassum_service::pipeline::{run_compute, CommandProducer, PipelineOptions, SnapshotProducer};
use sargassum_service::report::{build_report, render_table, ReportQuery};
use sargassum_service::store::{PgScoreStore, PgSnapshotStore};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "\
Usage:
  sargassum_service compute [--run ID] [--simulate] [--config PATH]
      Score every beach x forecast day of a drift run (latest run by default)
      and store the results. --simulate runs pipeline.simulate_command first.

  sargassum_service report [--day N | --beach NAME] [--json] [--config PATH]
      Print stored scores without recomputing (latest run by default).

Environment:
  DATABASE_URL   postgres connection string (also read from .env)";

#[derive(Debug, PartialEq)]
enum Mode {
    Compute { run: Option<String>, simulate: bool },
    Report { query: ReportQuery, json: bool },
    Help,
}

#[derive(Debug, PartialEq)]
struct Cli {
    mode: Mode,
    config: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut iter = args.iter();
    let command = iter.next().map(String::as_str);
    if matches!(command, None | Some("-h") | Some("--help") | Some("help")) {
        return Ok(Cli { mode: Mode::Help, config: None });
    }

    let mut config = None;
    let mut run = None;
    let mut simulate = false;
    let mut day: Option<u8> = None;
    let mut beach = None;
    let mut json = false;

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} requires a value", flag))
        };
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--run" => run = Some(value("--run")?),
            "--simulate" => simulate = true,
            "--day" => {
                let raw = value("--day")?;
                day = Some(raw.parse().map_err(|_| format!("invalid day offset '{}'", raw))?);
            }
            "--beach" => beach = Some(value("--beach")?),
            "--json" => json = true,
            "-h" | "--help" => return Ok(Cli { mode: Mode::Help, config: None }),
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }

    let mode = match command {
        Some("compute") => {
            if day.is_some() || beach.is_some() || json {
                return Err("--day, --beach and --json only apply to report".to_string());
            }
            Mode::Compute { run, simulate }
        }
        Some("report") => {
            if run.is_some() || simulate {
                return Err("--run and --simulate only apply to compute".to_string());
            }
            let query = match (day, beach) {
                (Some(_), Some(_)) => return Err("use either --day or --beach, not both".to_string()),
                (Some(d), None) => ReportQuery::Day(d),
                (None, Some(b)) => ReportQuery::Beach(b),
                (None, None) => ReportQuery::LatestRun,
            };
            Mode::Report { query, json }
        }
        Some(other) => return Err(format!("unknown command '{}'", other)),
        None => Mode::Help,
    };

    Ok(Cli { mode, config })
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{}\n\n{}", msg, USAGE);
            return ExitCode::from(2);
        }
    };

    if cli.mode == Mode::Help {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    let config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };
    logging::init_logger(config.log_level, config.log_file.as_deref(), config.console_timestamps);

    match cli.mode {
        Mode::Compute { run, simulate } => compute(&config, run.as_deref(), simulate),
        Mode::Report { query, json } => report(&config, &query, json),
        Mode::Help => ExitCode::SUCCESS,
    }
}

fn compute(config: &ServiceConfig, run: Option<&str>, simulate: bool) -> ExitCode {
    let registry = match config.beach_registry() {
        Ok(registry) => registry,
        Err(e) => {
            logging::error(Component::Registry, None, &e.to_string());
            return ExitCode::from(2);
        }
    };

    let mut producer = None;
    if simulate {
        match config.simulate_command.as_deref().and_then(CommandProducer::from_command) {
            Some(p) => producer = Some(p),
            None => {
                logging::error(
                    Component::Pipeline,
                    None,
                    "--simulate given but pipeline.simulate_command is not configured",
                );
                return ExitCode::from(2);
            }
        }
    }

    let connect = || db::connect_and_verify(&config.database_url, db::REQUIRED_SCHEMAS);
    let (snapshot_client, score_client) = match connect_pair(connect) {
        Ok(clients) => clients,
        Err(e) => {
            logging::error(Component::System, None, &e);
            return ExitCode::from(2);
        }
    };
    let mut snapshots = PgSnapshotStore::new(snapshot_client);
    let mut scores = PgScoreStore::new(score_client);

    let options = PipelineOptions {
        day_offsets: &config.day_offsets,
        max_run_age_hours: config.max_run_age_hours,
        now: Utc::now(),
    };

    let producer = producer.as_mut().map(|p| p as &mut dyn SnapshotProducer);
    match run_compute(&registry, &mut snapshots, &mut scores, producer, run, &options) {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            logging::error(Component::Pipeline, None, &e.to_string());
            ExitCode::from(1)
        }
    }
}

/// One connection per repository. Stops at the first failure.
fn connect_pair<T>(mut connect: impl FnMut() -> Result<T, String>) -> Result<(T, T), String> {
    let first = connect()?;
    let second = connect()?;
    Ok((first, second))
}

fn report(config: &ServiceConfig, query: &ReportQuery, json: bool) -> ExitCode {
    let client = match db::connect_and_verify(&config.database_url, db::REQUIRED_SCHEMAS) {
        Ok(client) => client,
        Err(e) => {
            logging::error(Component::System, None, &e);
            return ExitCode::from(2);
        }
    };
    let mut scores = PgScoreStore::new(client);

    let report = match build_report(&mut scores, query, Utc::now()) {
        Ok(report) => report,
        Err(e) => {
            logging::error(Component::Scores, None, &e.to_string());
            return ExitCode::from(1);
        }
    };

    if json {
        match report.to_json() {
            Ok(text) => println!("{}", text),
            Err(e) => {
                logging::error(Component::System, None, &format!("JSON encoding failed: {}", e));
                return ExitCode::from(1);
            }
        }
    } else {
        print!("{}", render_table(&report));
    }
    ExitCode::SUCCESS
}
