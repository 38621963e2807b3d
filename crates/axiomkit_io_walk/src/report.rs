//! Manipulation report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::FlagManipulationMarker;

/// One failed entry with path + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEntryError {
    /// Failed entry path.
    pub path: PathBuf,
    /// User-facing error text.
    pub exception: String,
}

/// Aggregate counters for one manipulation run.
#[derive(Debug, Default, Clone)]
pub struct ReportManipulation {
    /// Number of results observed.
    pub cnt_entries: u64,
    /// Entries whose handler completed.
    pub cnt_processed: u64,
    /// Entries with a handled error.
    pub cnt_failed: u64,
    /// Entries that created at least one directory.
    pub cnt_dirs_created: u64,
    /// Entries whose directory was deleted on leave.
    pub cnt_dirs_deleted: u64,
    /// Entries without any outcome bit (skipped or dry run).
    pub cnt_skipped: u64,
    /// Per-entry failures recorded by the error handler.
    pub errors: Vec<SpecEntryError>,
    /// Non-fatal warnings, e.g. the thread-pool fallback.
    pub warnings: Vec<String>,
}

impl ReportManipulation {
    /// Number of collected errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_entries".to_string(), self.cnt_entries);
        dict_counts.insert("cnt_processed".to_string(), self.cnt_processed);
        dict_counts.insert("cnt_failed".to_string(), self.cnt_failed);
        dict_counts.insert("cnt_dirs_created".to_string(), self.cnt_dirs_created);
        dict_counts.insert("cnt_dirs_deleted".to_string(), self.cnt_dirs_deleted);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} entries={} processed={} failed={} created={} deleted={} skipped={} warnings={}",
            self.cnt_entries,
            self.cnt_processed,
            self.cnt_failed,
            self.cnt_dirs_created,
            self.cnt_dirs_deleted,
            self.cnt_skipped,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportManipulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[WALK]"))
    }
}

/// Mutable accumulator for manipulation statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportManipulationBuilder {
    report: ReportManipulation,
}

impl ReportManipulationBuilder {
    /// Count one result by its marker bits.
    pub fn add_marker(&mut self, marker: FlagManipulationMarker) {
        let report = &mut self.report;
        report.cnt_entries += 1;
        if marker.contains(FlagManipulationMarker::ELEMENT_PROCESSED) {
            report.cnt_processed += 1;
        }
        if marker.contains(FlagManipulationMarker::ELEMENT_ERROR) {
            report.cnt_failed += 1;
        }
        if marker.contains(FlagManipulationMarker::DIRECTORY_CREATED) {
            report.cnt_dirs_created += 1;
        }
        if marker.contains(FlagManipulationMarker::DIRECTORY_DELETED) {
            report.cnt_dirs_deleted += 1;
        }
        if marker.is_empty() {
            report.cnt_skipped += 1;
        }
    }

    /// Add one path-scoped error.
    pub fn add_error(&mut self, path: PathBuf, exception: String) {
        self.report.errors.push(SpecEntryError { path, exception });
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.report.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportManipulation {
        self.report
    }
}
