use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for qtriage runs.
///
/// Structured variants for the cases callers branch on, plus a catch-all
/// `Internal` for invariant breaks. Recoverable per-statement problems
/// (parse failures, boundary mismatches) never become a `TriageError`; they
/// are reported as diagnostics and the run continues.
#[derive(Error, Debug)]
pub enum TriageError {
    // === Input / Output ===
    /// An input file (query log or runner report) could not be opened.
    #[error("cannot open input '{path}': {source}")]
    InputMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output file could not be created or written.
    #[error("cannot write output '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure (read errors mid-stream).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Canonicalization ===
    /// A literal whose type class the canonicalizer does not know how to
    /// erase. Continuing would produce a misleading canonical form.
    #[error("unhandled literal type class: {class}")]
    UnsupportedLiteral { class: String },

    /// Statement text could not be parsed.
    #[error("SQL parse error: {detail}")]
    Parse { detail: String },

    // === Configuration ===
    /// Bad command-line argument or settings value.
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },

    /// Internal invariant violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TriageError {
    /// Whether this error must abort the whole run.
    ///
    /// Parse failures are per-statement and recoverable; everything else
    /// stops the pipeline before any output is produced.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Parse { .. })
    }

    /// Whether the user can likely fix this without code changes.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InputMissing { .. } | Self::OutputWrite { .. } | Self::InvalidArgument { .. }
        )
    }

    /// Process exit code for CLI use.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidArgument { .. } => 64,
            Self::InputMissing { .. } => 66,
            Self::OutputWrite { .. } | Self::Io(_) => 74,
            Self::UnsupportedLiteral { .. } | Self::Parse { .. } | Self::Internal(_) => 70,
        }
    }

    /// Create an input-missing error.
    pub fn input_missing(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InputMissing {
            path: path.into(),
            source,
        }
    }

    /// Create an output-write error.
    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error.
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::Parse {
            detail: detail.into(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::InvalidArgument {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `TriageError`.
pub type Result<T> = std::result::Result<T, TriageError>;
