//! Query-log triage: attribute logged SQL statements to the test that ran
//! them, group statements by canonical shape, and rank the shapes by how
//! often they appear in failing tests.
//!
//! The pipeline is one forward pass ([`scan::scan_log`]) fed by the failed
//! test set ([`report::read_failure_report`]); [`analysis::analyze`] drives
//! both from [`Settings`] and writes every rendered output.

pub mod analysis;
pub mod boundary;
pub mod canonical;
pub mod collection;
pub mod emit;
pub mod extract;
mod patterns;
pub mod ranking;
pub mod report;
pub mod scan;
pub mod settings;
pub mod sink;
pub mod test_id;

pub use analysis::{AnalysisOutput, analyze, check_inputs};
pub use canonical::LiteralPolicy;
pub use collection::{QueryCollection, Statement};
pub use patterns::REPORT_SEPARATOR;
pub use report::{FailedTests, read_failure_report};
pub use scan::{Diagnostic, ScanOptions, ScanOutcome, scan_log};
pub use settings::Settings;
