//! Per-folder and aggregate sweep results.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::transport::MessageRef;

/// A message that matched, with the sender and the rule that caught it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedMessage {
    #[serde(flatten)]
    pub message: MessageRef,
    pub sender: String,
    pub rule: String,
}

/// Outcome of scanning one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub folder: String,
    pub scanned: usize,
    pub matched: usize,
    pub deleted: usize,
    pub extraction_failures: usize,
    pub failed_delete_batches: usize,
    pub expunged: bool,
    pub rule_hits: BTreeMap<String, usize>,
    pub matches: Vec<MatchedMessage>,
    pub errors: Vec<String>,
}

impl ScanResult {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    /// A folder that could not be scanned at all.
    pub fn failed(folder: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(folder);
        result.errors.push(error.into());
        result
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub folders: usize,
    pub scanned: usize,
    pub matched: usize,
    pub deleted: usize,
    pub extraction_failures: usize,
    pub failed_delete_batches: usize,
    pub folders_with_errors: usize,
}

impl Totals {
    pub fn add(&mut self, result: &ScanResult) {
        self.folders += 1;
        self.scanned += result.scanned;
        self.matched += result.matched;
        self.deleted += result.deleted;
        self.extraction_failures += result.extraction_failures;
        self.failed_delete_batches += result.failed_delete_batches;
        if result.has_errors() {
            self.folders_with_errors += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    DryRun,
    Delete,
}

impl Mode {
    pub fn from_delete_flag(delete: bool) -> Self {
        if delete { Self::Delete } else { Self::DryRun }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DryRun => "DRY-RUN",
            Self::Delete => "DELETE",
        }
    }
}

/// Everything a run produced, including folders finished before an abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub mode: Mode,
    pub folders: Vec<ScanResult>,
    pub totals: Totals,
    pub rule_hits: BTreeMap<String, usize>,
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            folders: Vec::new(),
            totals: Totals::default(),
            rule_hits: BTreeMap::new(),
            aborted: None,
        }
    }

    pub fn push(&mut self, result: ScanResult) {
        self.totals.add(&result);
        for (rule, hits) in &result.rule_hits {
            *self.rule_hits.entry(rule.clone()).or_default() += hits;
        }
        self.folders.push(result);
    }

    /// Clean means every folder finished without a recorded error. Match
    /// counts play no part in it.
    pub fn is_clean(&self) -> bool {
        self.aborted.is_none() && self.folders.iter().all(|f| !f.has_errors())
    }
}

#[cfg(test)]
mod tests {
    use super::{Mode, RunReport, ScanResult};

    fn scanned(folder: &str, scanned: usize, matched: usize) -> ScanResult {
        let mut result = ScanResult::new(folder);
        result.scanned = scanned;
        result.matched = matched;
        result.rule_hits.insert("ozon.ru".to_string(), matched);
        result
    }

    #[test]
    fn totals_sum_folder_counts() {
        let mut report = RunReport::new(Mode::DryRun);
        report.push(scanned("INBOX", 10, 3));
        report.push(scanned("Spam", 5, 4));
        assert_eq!(report.totals.folders, 2);
        assert_eq!(report.totals.scanned, 15);
        assert_eq!(report.totals.matched, 7);
        assert_eq!(report.rule_hits.get("ozon.ru"), Some(&7));
        assert!(report.is_clean());
    }

    #[test]
    fn folder_errors_make_the_run_unclean() {
        let mut report = RunReport::new(Mode::Delete);
        report.push(scanned("INBOX", 1, 1));
        report.push(ScanResult::failed("Archive", "no such folder"));
        assert_eq!(report.totals.folders_with_errors, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn abort_makes_the_run_unclean() {
        let mut report = RunReport::new(Mode::DryRun);
        report.aborted = Some("connection reset".to_string());
        assert!(!report.is_clean());
    }

    #[test]
    fn serializes_with_kebab_mode() {
        let report = RunReport::new(Mode::DryRun);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "dry-run");
        assert_eq!(json["totals"]["scanned"], 0);
    }
}
