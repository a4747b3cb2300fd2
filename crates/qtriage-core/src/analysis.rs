//! One complete analysis run: read both inputs, scan, rank, write outputs.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use qtriage_error::{Result, TriageError};
use tracing::{info, info_span};

use crate::emit::{
    AnalysisSummary, write_analysis, write_flat_queries, write_queries, write_summary_json,
    write_tests,
};
use crate::ranking::rank_groups;
use crate::report::{FailedTests, read_failure_report};
use crate::scan::{Diagnostic, scan_log};
use crate::settings::Settings;
use crate::sink::{ConsoleSink, FanOutSink, FileSink, OutputSink};

/// Paths written by [`analyze`] and headline counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOutput {
    /// `.queries`, when any statement was collected.
    pub queries_path: Option<PathBuf>,
    /// `.queries_flat`, alongside `.queries`.
    pub flat_queries_path: Option<PathBuf>,
    /// `.tests`, when any test closed.
    pub tests_path: Option<PathBuf>,
    pub analysis_path: PathBuf,
    /// `.analysis.json`, when requested.
    pub summary_path: Option<PathBuf>,
    pub statement_count: usize,
    pub test_count: usize,
    pub group_count: usize,
    pub failed_test_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the whole pipeline described by `settings`.
///
/// Both inputs are opened before anything is written, so a missing input
/// leaves no partial outputs behind.
///
/// # Errors
///
/// - `TriageError::InputMissing` when the log or the report cannot be opened.
/// - `TriageError::OutputWrite` when an output cannot be written.
/// - Fatal scan errors from [`scan_log`].
pub fn analyze(settings: &Settings) -> Result<AnalysisOutput> {
    let span = info_span!("analyze", log = %settings.log_path.display());
    let _guard = span.enter();

    let log = open_input(&settings.log_path)?;
    let report = settings
        .report_path
        .as_deref()
        .map(open_input)
        .transpose()?;

    let failed = match report {
        Some(reader) => read_failure_report(reader)?,
        None => FailedTests::new(),
    };
    let outcome = scan_log(log, &failed, &settings.scan_options())?;
    let collection = &outcome.collection;
    let groups = rank_groups(collection);

    let mut output = AnalysisOutput {
        statement_count: collection.len(),
        test_count: outcome.tests.len(),
        group_count: groups.len(),
        failed_test_count: failed.len(),
        ..AnalysisOutput::default()
    };

    if !collection.is_empty() {
        let path = settings.output_path(".queries");
        let mut sink = mirrored(FileSink::create(&path)?, settings.verbose);
        write_queries(&mut sink, collection, settings.log_query_text)?;
        output.queries_path = Some(path);

        let path = settings.output_path(".queries_flat");
        write_flat_queries(&mut FileSink::create(&path)?, collection)?;
        output.flat_queries_path = Some(path);
    }

    if !outcome.tests.is_empty() {
        let path = settings.output_path(".tests");
        write_tests(&mut FileSink::create(&path)?, &outcome.tests, collection)?;
        output.tests_path = Some(path);
    }

    let path = settings.output_path(".analysis");
    let mut sink = mirrored(FileSink::create(&path)?, settings.verbose);
    write_analysis(&mut sink, collection, &groups, settings.log_query_text)?;
    output.analysis_path = path;

    if settings.json_summary {
        let path = settings.summary_path();
        let summary = AnalysisSummary::build(collection, &groups, &outcome.diagnostics);
        write_summary_json(&mut FileSink::create(&path)?, &summary)?;
        output.summary_path = Some(path);
    }

    info!(
        statements = output.statement_count,
        tests = output.test_count,
        groups = output.group_count,
        failed_tests = output.failed_test_count,
        analysis = %output.analysis_path.display(),
        "analysis written"
    );
    output.diagnostics = outcome.diagnostics;
    Ok(output)
}

/// Confirm both inputs can be opened, without reading them.
///
/// # Errors
///
/// `TriageError::InputMissing` naming the first input that cannot be opened.
pub fn check_inputs(settings: &Settings) -> Result<()> {
    open_input(&settings.log_path)?;
    if let Some(report) = &settings.report_path {
        open_input(report)?;
    }
    Ok(())
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| TriageError::input_missing(path, err))
}

/// The file sink, plus stdout when `verbose`.
fn mirrored(file: FileSink, verbose: bool) -> FanOutSink {
    let console = verbose.then(|| Box::new(ConsoleSink) as Box<dyn OutputSink>);
    FanOutSink::new().with(Some(Box::new(file))).with(console)
}
