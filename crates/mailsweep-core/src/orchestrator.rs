//! Folder resolution and the sequential per-folder run.

use tracing::{info, warn};

use crate::Result;
use crate::report::{Mode, RunReport, ScanResult};
use crate::rules::RuleSet;
use crate::scanner::{FolderScanner, ScanOptions};
use crate::transport::MailTransport;

pub const ALL_FOLDERS: &str = "*";

/// Which folders a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderSelector {
    All,
    Explicit(Vec<String>),
}

impl FolderSelector {
    /// `*` or an empty string select everything; anything else is a
    /// comma-separated list of folder names.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == ALL_FOLDERS {
            return Self::All;
        }
        Self::Explicit(split_list(trimmed))
    }
}

impl Default for FolderSelector {
    fn default() -> Self {
        Self::Explicit(vec!["INBOX".to_string()])
    }
}

/// Splits a comma-separated list, dropping blank entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Applies the selector and skip-list to the folders the server offers.
///
/// The result always follows server order. Skip-list entries are exact,
/// case-sensitive names. Requested names the server does not offer are
/// dropped with a warning.
pub fn resolve_folders(
    selector: &FolderSelector,
    skip: &[String],
    available: &[String],
) -> Vec<String> {
    let skipped = |name: &str| skip.iter().any(|s| s == name);
    let wanted = match selector {
        FolderSelector::All => None,
        FolderSelector::Explicit(wanted) => {
            for name in wanted {
                if !available.contains(name) {
                    warn!(folder = %name, "folder not offered by server, ignoring");
                }
            }
            Some(wanted)
        }
    };
    available
        .iter()
        .filter(|name| !skipped(name.as_str()))
        .filter(|name| wanted.is_none_or(|wanted| wanted.contains(*name)))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct SweepConfig {
    pub folders: FolderSelector,
    pub skip_folders: Vec<String>,
    pub scan: ScanOptions,
}

/// Runs the sweep over every resolved folder, one at a time, on a single
/// session.
pub struct Orchestrator<'a, T: MailTransport + ?Sized> {
    transport: &'a mut T,
    rules: &'a RuleSet,
    config: &'a SweepConfig,
}

impl<'a, T: MailTransport + ?Sized> Orchestrator<'a, T> {
    pub fn new(transport: &'a mut T, rules: &'a RuleSet, config: &'a SweepConfig) -> Self {
        Self {
            transport,
            rules,
            config,
        }
    }

    /// `Err` only if the folder list cannot be fetched. Everything after
    /// that ends up in the report, including a connection loss midway.
    pub fn run(&mut self) -> Result<RunReport> {
        let mode = Mode::from_delete_flag(self.config.scan.delete);
        let available = self.transport.list_folders()?;
        let targets = resolve_folders(&self.config.folders, &self.config.skip_folders, &available);
        info!(
            folders = targets.len(),
            rules = self.rules.len(),
            mode = mode.label(),
            "starting sweep"
        );

        let mut report = RunReport::new(mode);
        for folder in targets {
            if let Err(err) = self.transport.select(&folder, !self.config.scan.delete) {
                if err.is_fatal() {
                    warn!(folder = %folder, error = %err, "connection lost, stopping");
                    report.aborted = Some(err.to_string());
                    break;
                }
                warn!(folder = %folder, error = %err, "cannot select folder, skipping");
                report.push(ScanResult::failed(folder, err.to_string()));
                continue;
            }

            match FolderScanner::new(&mut *self.transport, self.rules, &self.config.scan)
                .scan(&folder)
            {
                Ok(result) => report.push(result),
                Err(aborted) => {
                    report.aborted = Some(aborted.error.to_string());
                    report.push(aborted.partial);
                    break;
                }
            }
        }

        info!(
            scanned = report.totals.scanned,
            matched = report.totals.matched,
            deleted = report.totals.deleted,
            extraction_failures = report.totals.extraction_failures,
            "sweep finished"
        );
        Ok(report)
    }
}
