//! Diagnostic logging for the CLI.
//!
//! Two layers: a compact human-readable layer on stderr (only with
//! `--verbose`, since stdout carries the mirrored reports) and a JSON-lines
//! layer written next to the other outputs. `RUST_LOG` overrides the level.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Returned by [`init_logging`]; names the JSON-lines file.
#[derive(Debug)]
pub struct LogGuard {
    pub log_path: PathBuf,
}

#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<File>>,
}

impl SharedFileWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl<'a> MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            guard: self.file.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Holds the file lock for one event.
struct SharedFileGuard<'a> {
    guard: MutexGuard<'a, File>,
}

impl Write for SharedFileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.flush()
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns the I/O error if the JSON-lines file cannot be created.
pub fn init_logging(log_path: &Path, verbose: bool) -> io::Result<LogGuard> {
    let file = File::create(log_path)?;

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(SharedFileWriter::new(file))
        .with_target(true);

    let console_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .compact()
    });

    // A second initialization (tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(console_layer)
        .with(json_layer)
        .try_init();

    Ok(LogGuard {
        log_path: log_path.to_path_buf(),
    })
}

/// Run `f`, logging its duration and outcome under `stage`.
pub fn log_timed_stage<T, E: std::fmt::Display>(
    stage: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let start = Instant::now();
    let result = f();
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match &result {
        Ok(_) => tracing::info!(stage, elapsed_ms, success = true, "stage complete"),
        Err(e) => tracing::warn!(stage, elapsed_ms, success = false, error = %e, "stage failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped_json_subscriber(
        log_path: &Path,
        filter: &str,
    ) -> impl tracing::Subscriber + Send + Sync {
        let file = File::create(log_path).expect("create log file");
        tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(SharedFileWriter::new(file)),
            )
    }

    #[test]
    fn json_lines_carry_structured_fields() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let log_path = tmp.path().join("dolt.log.jsonl");
        let subscriber = scoped_json_subscriber(&log_path, "info");

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(line_number = 42_u64, test_id = "pkg.Case.test_a", "statement did not parse");
            tracing::debug!(filtered = true, "below the level");
        });

        let content = std::fs::read_to_string(&log_path).expect("read log");
        let events: Vec<serde_json::Value> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("valid JSON line"))
            .collect();
        assert_eq!(events.len(), 1, "{content}");
        assert_eq!(events[0]["level"], "WARN");
        assert_eq!(events[0]["fields"]["line_number"], 42);
        assert_eq!(events[0]["fields"]["test_id"], "pkg.Case.test_a");
    }

    #[test]
    fn timed_stage_passes_result_through() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let log_path = tmp.path().join("timed.log.jsonl");
        let subscriber = scoped_json_subscriber(&log_path, "info");

        tracing::subscriber::with_default(subscriber, || {
            let ok: Result<u32, String> = log_timed_stage("analyze", || Ok(7));
            assert_eq!(ok, Ok(7));
            let err: Result<u32, String> = log_timed_stage("analyze", || Err("boom".to_owned()));
            assert!(err.is_err());
        });

        let content = std::fs::read_to_string(&log_path).expect("read log");
        assert!(content.contains("elapsed_ms"), "{content}");
        assert!(content.contains("stage failed"), "{content}");
    }

    #[test]
    fn init_logging_creates_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let log_path = tmp.path().join("run.log.jsonl");
        let guard = init_logging(&log_path, false).expect("init");
        assert_eq!(guard.log_path, log_path);
        assert!(log_path.exists());
    }
}
