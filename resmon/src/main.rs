//! Entry point for resmon. Parses args, sets up logging and runs one sampling session.

mod app;
mod headless;
mod history;
mod ui;

use std::env;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Local};
use once_cell::sync::OnceCell;
use resmon_core::{
    default_providers, stop_channel, DisplayFeed, SampleSink, Session, SessionConfig, SessionError,
    SessionReport, StopReason,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::App;
use headless::LogSink;

const DEFAULT_LOG_FILTER: &str = "resmon=info,resmon_core=info";

#[derive(Debug, PartialEq)]
struct ParsedArgs {
    interval: f64,
    duration: Option<f64>,
    output: Option<PathBuf>,
    no_tui: bool,
}

#[derive(Debug, PartialEq)]
enum ArgError {
    Help(String),
    Invalid(String),
}

fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [-i SECS|--interval SECS] [-d SECS|--duration SECS] [-o PATH|--output PATH] [--no-tui]\n\
         \n  -i, --interval SECS   seconds between samples (default 1.0)\
         \n  -d, --duration SECS   stop after this many seconds (default: until q or Ctrl-C)\
         \n  -o, --output PATH     CSV file to append to (default: timestamped file in the data dir)\
         \n      --no-tui          log each sample instead of drawing the terminal UI\
         \n  -h, --help            show this help"
    )
}

fn parse_secs(flag: &str, value: Option<String>, prog: &str) -> Result<f64, ArgError> {
    let v = value.ok_or_else(|| ArgError::Invalid(format!("{flag} needs a value\n{}", usage(prog))))?;
    v.trim()
        .parse::<f64>()
        .map_err(|_| ArgError::Invalid(format!("{flag}: '{v}' is not a number of seconds")))
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, ArgError> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "resmon".into());
    let mut interval = 1.0;
    let mut duration: Option<f64> = None;
    let mut output: Option<PathBuf> = None;
    let mut no_tui = false;

    while let Some(arg) = it.next() {
        // --flag=value is accepted for every flag that takes a value
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = || inline.clone().or_else(|| it.next());
        match flag.as_str() {
            "-h" | "--help" => return Err(ArgError::Help(usage(&prog))),
            "-i" | "--interval" => interval = parse_secs("--interval", value(), &prog)?,
            "-d" | "--duration" => duration = Some(parse_secs("--duration", value(), &prog)?),
            "-o" | "--output" => match value() {
                Some(p) if !p.is_empty() => output = Some(PathBuf::from(p)),
                _ => {
                    return Err(ArgError::Invalid(format!(
                        "--output needs a path\n{}",
                        usage(&prog)
                    )))
                }
            },
            "--no-tui" => no_tui = true,
            _ => {
                return Err(ArgError::Invalid(format!(
                    "Unexpected argument '{arg}'.\n{}",
                    usage(&prog)
                )))
            }
        }
    }
    Ok(ParsedArgs {
        interval,
        duration,
        output,
        no_tui,
    })
}

// Runtime toggles (read once)
fn gpu_enabled() -> bool {
    static ON: OnceCell<bool> = OnceCell::new();
    *ON.get_or_init(|| env::var("RESMON_GPU").map(|v| v != "0").unwrap_or(true))
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn apply_env(cfg: SessionConfig) -> SessionConfig {
    let mut cfg = cfg;
    if let Some(ms) = env_u64("RESMON_PROVIDER_TIMEOUT_MS") {
        cfg = cfg.with_provider_timeout(Duration::from_millis(ms));
    }
    let mut flush = cfg.flush;
    if let Some(rows) = env_u64("RESMON_FLUSH_ROWS") {
        flush.max_rows = rows as usize;
    }
    if let Some(secs) = env_u64("RESMON_FLUSH_SECS") {
        flush.max_age = Duration::from_secs(secs);
    }
    cfg.with_flush(flush)
}

fn default_output_path(now: DateTime<Local>) -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("data"))
        .join("resmon")
        .join(format!("resource-monitor-{}.csv", now.format("%Y%m%d-%H%M%S")))
}

fn log_path(output: &Path) -> PathBuf {
    let mut p: OsString = output.as_os_str().to_owned();
    p.push(".log");
    PathBuf::from(p)
}

fn prepare_output(output: &Path) -> anyhow::Result<()> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

/// TUI mode logs to a file next to the CSV so the screen stays clean.
fn init_tracing(tui: bool, output: &Path) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if tui {
        let path = log_path(output);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(ArgError::Help(text)) => {
            println!("{text}");
            return ExitCode::SUCCESS;
        }
        Err(ArgError::Invalid(msg)) => {
            eprintln!("{msg}");
            return ExitCode::from(2);
        }
    };

    let output = parsed
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(Local::now()));
    // Nothing touches the filesystem until the configuration is known to be valid
    let session = match SessionConfig::from_secs(parsed.interval, parsed.duration, &output)
        .map_err(SessionError::from)
        .map(apply_env)
        .and_then(Session::new)
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("resmon: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let tui = !parsed.no_tui && std::io::stdout().is_terminal();
    if let Err(e) = prepare_output(&output).and_then(|_| init_tracing(tui, &output)) {
        eprintln!("resmon: {e:#}");
        return ExitCode::from(1);
    }
    if !parsed.no_tui && !tui {
        info!("stdout is not a terminal; running headless");
    }

    match run(session, tui).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e
                .downcast_ref::<SessionError>()
                .map(SessionError::exit_code)
                .unwrap_or(1);
            eprintln!("resmon: {e:#}");
            ExitCode::from(code)
        }
    }
}

async fn run(mut session: Session, tui: bool) -> anyhow::Result<SessionReport> {
    let (stop_handle, stop) = stop_channel();
    let on_interrupt = stop_handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; finishing the current tick");
            on_interrupt.stop();
        }
    });

    let providers = default_providers(session.config().interval, gpu_enabled());

    if !tui {
        let sinks: Vec<Box<dyn SampleSink>> = vec![Box::new(LogSink)];
        return Ok(session.run(providers, sinks, stop).await?);
    }

    let (feed, rx) = DisplayFeed::channel();
    let cfg = session.config().clone();
    let task = tokio::spawn(async move {
        let sinks: Vec<Box<dyn SampleSink>> = vec![Box::new(feed)];
        session.run(providers, sinks, stop).await
    });

    let host = sysinfo::System::host_name().unwrap_or_else(|| "localhost".into());
    let mut app = App::new(host, cfg.output_path.clone(), cfg.interval);
    if let Err(e) = app.run(rx, stop_handle.clone()).await {
        // without a screen there is no way to quit interactively
        warn!("terminal UI failed: {e}; stopping session");
        stop_handle.stop();
    }

    Ok(task.await.context("session task failed")??)
}

fn print_summary(r: &SessionReport) {
    let why = match &r.stop {
        StopReason::DurationElapsed => "duration reached",
        StopReason::Cancelled => "stopped",
        StopReason::SinkFailed(_) => "recorder failed",
    };
    println!(
        "resmon: {why}; {} rows written to {}",
        r.rows_recorded,
        r.output_path.display()
    );
    if r.skipped_slots > 0 {
        println!(
            "resmon: {} ticks skipped because sampling overran the interval",
            r.skipped_slots
        );
    }
    for ex in &r.excluded {
        println!("resmon: {} not recorded ({})", ex.name, ex.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        std::iter::once("resmon")
            .chain(v.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_without_flags() {
        let p = parse_args(args(&[])).unwrap();
        assert_eq!(
            p,
            ParsedArgs {
                interval: 1.0,
                duration: None,
                output: None,
                no_tui: false
            }
        );
    }

    #[test]
    fn short_long_and_inline_forms() {
        let p = parse_args(args(&["-i", "0.5", "--duration", "10", "-o", "out.csv", "--no-tui"])).unwrap();
        assert_eq!(p.interval, 0.5);
        assert_eq!(p.duration, Some(10.0));
        assert_eq!(p.output, Some(PathBuf::from("out.csv")));
        assert!(p.no_tui);

        let p = parse_args(args(&["--interval=2", "--output=/tmp/x.csv"])).unwrap();
        assert_eq!(p.interval, 2.0);
        assert_eq!(p.output, Some(PathBuf::from("/tmp/x.csv")));
    }

    #[test]
    fn help_wins_and_bad_input_is_invalid() {
        assert!(matches!(parse_args(args(&["-i", "3", "--help"])), Err(ArgError::Help(_))));
        assert!(matches!(parse_args(args(&["-i", "fast"])), Err(ArgError::Invalid(_))));
        assert!(matches!(parse_args(args(&["-d"])), Err(ArgError::Invalid(_))));
        assert!(matches!(parse_args(args(&["--bogus"])), Err(ArgError::Invalid(_))));
    }

    #[test]
    fn default_output_is_timestamped_csv() {
        use chrono::TimeZone;
        let at = Local.with_ymd_and_hms(2026, 10, 17, 9, 5, 3).unwrap();
        let p = default_output_path(at);
        assert_eq!(
            p.file_name().unwrap().to_str().unwrap(),
            "resource-monitor-20261017-090503.csv"
        );
        assert_eq!(p.parent().unwrap().file_name().unwrap(), "resmon");
    }

    #[test]
    fn log_file_sits_next_to_csv() {
        assert_eq!(log_path(Path::new("/tmp/run.csv")), PathBuf::from("/tmp/run.csv.log"));
    }
}
