//! Run configuration and output path derivation.

use std::path::{Path, PathBuf};

use qtriage_error::{Result, TriageError};

use crate::canonical::LiteralPolicy;
use crate::scan::ScanOptions;

/// Everything one analysis run needs.
///
/// Outputs land next to the query log: for `/runs/dolt.log` the `.queries`
/// output is `/runs/dolt.queries.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub log_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Log file name without its extension.
    pub output_base_name: String,
    /// Log file extension including the dot, or empty.
    pub log_extension: String,
    pub hide_non_test_queries: bool,
    /// Include statement text in the `.queries` and `.analysis` blocks.
    pub log_query_text: bool,
    /// Mirror `.queries` and `.analysis` to stdout.
    pub verbose: bool,
    pub literal_policy: LiteralPolicy,
    /// Also write `.analysis.json`.
    pub json_summary: bool,
}

impl Settings {
    /// Settings with every switch off, deriving output locations from
    /// `log_path`.
    ///
    /// # Errors
    ///
    /// `TriageError::InvalidArgument` if `log_path` has no file name.
    pub fn from_log_path(log_path: impl Into<PathBuf>) -> Result<Self> {
        let log_path = log_path.into();
        let file_name = log_path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                TriageError::invalid_argument(format!(
                    "log path '{}' has no file name",
                    log_path.display()
                ))
            })?;
        let (base, extension) = split_extension(file_name);
        let output_dir = log_path
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf);

        Ok(Self {
            output_base_name: base.to_owned(),
            log_extension: extension.to_owned(),
            output_dir,
            log_path,
            report_path: None,
            hide_non_test_queries: false,
            log_query_text: false,
            verbose: false,
            literal_policy: LiteralPolicy::default(),
            json_summary: false,
        })
    }

    #[must_use]
    pub fn with_report(mut self, report_path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(report_path.into());
        self
    }

    /// `output_dir / (base + suffix + extension)`.
    #[must_use]
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{}{suffix}{}",
            self.output_base_name, self.log_extension
        ))
    }

    /// JSON summary, `output_dir / base.analysis.json`.
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.analysis.json", self.output_base_name))
    }

    /// JSON-lines diagnostics log, `output_dir / base.log.jsonl`.
    #[must_use]
    pub fn diagnostics_log_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.log.jsonl", self.output_base_name))
    }

    #[must_use]
    pub const fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            hide_non_test_queries: self.hide_non_test_queries,
            literal_policy: self.literal_policy,
        }
    }
}

/// Split at the last dot; a leading dot is part of the name.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}
