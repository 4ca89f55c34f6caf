//! Outcome of reading a source.

use crate::text::RecordError;

/// A record that was skipped, with the line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadIssue {
    /// 1-based physical line number.
    pub line: usize,
    /// Why the record was skipped.
    pub error: RecordError,
}

/// Counters collected while ingesting a source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Logical records read, including skipped ones.
    pub records: u64,
    /// Header records kept.
    pub header_records: u64,
    /// Blocks declared.
    pub blocks: u64,
    /// Rows stored across all blocks.
    pub features: u64,
    /// Rows of declared blocks that were dropped.
    pub skipped_rows: u64,
    /// Whether the cache was reused instead of parsing the source.
    pub reused_cache: bool,
    /// Every skipped record in source order.
    pub issues: Vec<LoadIssue>,
}

impl LoadReport {
    pub(crate) fn record_issue(&mut self, line: usize, error: RecordError) {
        self.issues.push(LoadIssue { line, error });
    }

    /// Records skipped because they were malformed.
    #[must_use]
    pub fn format_errors(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| !issue.error.is_reference_error())
            .count()
    }

    /// Rows skipped because their block was never declared.
    #[must_use]
    pub fn reference_errors(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.error.is_reference_error())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn issues_are_classified() {
        let mut report = LoadReport::default();
        report.record_issue(
            3,
            RecordError::UndeclaredBlock {
                block: "XYZ".into(),
            },
        );
        report.record_issue(
            4,
            RecordError::UnknownPrefix {
                prefix: "&Q".into(),
            },
        );
        assert_eq!(report.reference_errors(), 1);
        assert_eq!(report.format_errors(), 1);
    }
}
