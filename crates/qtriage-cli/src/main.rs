use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use qtriage_core::{LiteralPolicy, Settings, analyze, check_inputs};
use qtriage_error::TriageError;

mod logging;

#[derive(Debug)]
struct CliConfig {
    log_path: PathBuf,
    report_path: Option<PathBuf>,
    hide_non_test_queries: bool,
    show_query_text: bool,
    preserve_literals: bool,
    json_summary: bool,
    verbose: bool,
}

fn print_help() {
    let help = "\
qtriage - attribute logged SQL to tests and rank query shapes by failure density

USAGE:
    qtriage --log <PATH> [OPTIONS]

OPTIONS:
    --log <PATH>               Query log written by the SQL server (required)
    --pytest-report <PATH>     Test-runner report listing FAIL/ERROR tests
    --hide-non-test-queries    Drop statements that ran outside any test
    --show-query-text          Include statement text in .queries and .analysis
    --preserve-literals        Group by exact literal values instead of erasing them
    --json                     Also write a .analysis.json summary
    -v, --verbose              Mirror reports to stdout and log progress to stderr
    -h, --help                 Show this help

Outputs are written next to the log: <base>.queries<ext>, <base>.queries_flat<ext>,
<base>.tests<ext>, <base>.analysis<ext> and <base>.log.jsonl. Nothing is written
when an input cannot be opened.
";
    println!("{help}");
}

fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let mut log_path = None;
    let mut config = CliConfig {
        log_path: PathBuf::new(),
        report_path: None,
        hide_non_test_queries: false,
        show_query_text: false,
        preserve_literals: false,
        json_summary: false,
        verbose: false,
    };

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--log" => {
                index += 1;
                if index >= args.len() {
                    return Err("--log requires a value".to_owned());
                }
                log_path = Some(PathBuf::from(&args[index]));
            }
            "--pytest-report" => {
                index += 1;
                if index >= args.len() {
                    return Err("--pytest-report requires a value".to_owned());
                }
                config.report_path = Some(PathBuf::from(&args[index]));
            }
            "--hide-non-test-queries" => config.hide_non_test_queries = true,
            "--show-query-text" => config.show_query_text = true,
            "--preserve-literals" => config.preserve_literals = true,
            "--json" => config.json_summary = true,
            "-v" | "--verbose" => config.verbose = true,
            "-h" | "--help" => {
                print_help();
                return Err(String::new());
            }
            unknown => return Err(format!("unknown option: {unknown}")),
        }
        index += 1;
    }

    config.log_path = log_path.ok_or_else(|| "--log is required".to_owned())?;
    Ok(config)
}

/// Why a run stopped.
#[derive(Debug)]
enum RunError {
    /// Bad command line; empty after `--help`.
    Usage(String),
    Triage(TriageError),
}

impl RunError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(message) if message.is_empty() => ExitCode::SUCCESS,
            Self::Usage(_) => ExitCode::from(2),
            Self::Triage(error) => ExitCode::from(error.exit_code()),
        }
    }
}

impl From<TriageError> for RunError {
    fn from(error: TriageError) -> Self {
        Self::Triage(error)
    }
}

fn build_settings(config: &CliConfig) -> Result<Settings, TriageError> {
    let mut settings = Settings::from_log_path(&config.log_path)?;
    settings.report_path.clone_from(&config.report_path);
    settings.hide_non_test_queries = config.hide_non_test_queries;
    settings.log_query_text = config.show_query_text;
    settings.verbose = config.verbose;
    settings.json_summary = config.json_summary;
    settings.literal_policy = if config.preserve_literals {
        LiteralPolicy::Preserve
    } else {
        LiteralPolicy::Erase
    };
    Ok(settings)
}

fn run(args: &[String]) -> Result<(), RunError> {
    let config = parse_args(args).map_err(RunError::Usage)?;
    let settings = build_settings(&config)?;
    check_inputs(&settings)?;

    let log_path = settings.diagnostics_log_path();
    let _log_guard = logging::init_logging(&log_path, settings.verbose)
        .map_err(|error| TriageError::output_write(&log_path, error))?;

    let output = logging::log_timed_stage("analyze", || analyze(&settings))?;

    if !output.diagnostics.is_empty() {
        eprintln!(
            "{} recoverable problem(s) logged to {}",
            output.diagnostics.len(),
            settings.diagnostics_log_path().display()
        );
    }
    eprintln!("analysis written to {}", output.analysis_path.display());
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match &error {
                RunError::Usage(message) if message.is_empty() => {}
                RunError::Usage(message) => {
                    eprintln!("ERROR {message}");
                    eprintln!("run with --help for usage");
                }
                RunError::Triage(triage) => eprintln!("ERROR qtriage failed: {triage}"),
            }
            error.exit_code()
        }
    }
}
