//! The per-folder sweep: list, fetch, match, then delete or report.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::batch::{BatchSize, plan};
use crate::report::{MatchedMessage, ScanResult};
use crate::rules::RuleSet;
use crate::sender::extract_metadata;
use crate::transport::{MailTransport, MessageRef};
use crate::{Error, Result};

pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How often a failed protocol step is repeated and how long to wait first.
/// The delay doubles after every failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub batch_size: BatchSize,
    pub delete: bool,
    pub retry: RetryPolicy,
}

/// Result of one protocol step after retries. Fatal errors never end up
/// here; they are returned as `Err` and stop the scan.
#[derive(Debug)]
enum Attempt<T> {
    Done(T),
    Failed(Error),
}

/// A scan stopped by a fatal error.
#[derive(Debug, thiserror::Error)]
#[error("scan of '{}' aborted: {error}", .partial.folder)]
pub struct Aborted {
    pub partial: ScanResult,
    pub error: Error,
}

enum State {
    Listing,
    Matching(Vec<MessageRef>),
    DryRunReport,
    Deleting,
    Expunging,
    Done,
}

/// Drives one folder through `Listing → Matching → (DryRunReport |
/// Deleting → Expunging) → Done`.
///
/// The folder must already be selected on `transport`. Only messages that
/// matched a rule in this scan are ever passed to `delete`.
pub struct FolderScanner<'a, T: MailTransport + ?Sized> {
    transport: &'a mut T,
    rules: &'a RuleSet,
    options: &'a ScanOptions,
}

impl<'a, T: MailTransport + ?Sized> FolderScanner<'a, T> {
    pub fn new(transport: &'a mut T, rules: &'a RuleSet, options: &'a ScanOptions) -> Self {
        Self {
            transport,
            rules,
            options,
        }
    }

    /// Scans `folder`. Recoverable failures are recorded in the returned
    /// result. `Err` means the session became unusable; it still carries
    /// whatever the scan had done up to that point.
    pub fn scan(mut self, folder: &str) -> std::result::Result<ScanResult, Aborted> {
        let mut result = ScanResult::new(folder);
        match self.drive(&mut result) {
            Ok(()) => Ok(result),
            Err(error) => {
                warn!(folder, error = %error, "scan aborted");
                result.errors.push(format!("aborted: {}", error));
                Err(Aborted {
                    partial: result,
                    error,
                })
            }
        }
    }

    fn drive(&mut self, result: &mut ScanResult) -> Result<()> {
        let mut state = State::Listing;
        loop {
            state = match state {
                State::Listing => self.list(result)?,
                State::Matching(ids) => self.fetch_and_match(&ids, result)?,
                State::DryRunReport => {
                    info!(
                        folder = %result.folder,
                        matched = result.matched,
                        "dry-run: nothing deleted"
                    );
                    State::Done
                }
                State::Deleting => self.delete_matched(result)?,
                State::Expunging => self.expunge(result)?,
                State::Done => return Ok(()),
            };
        }
    }

    fn list(&mut self, result: &mut ScanResult) -> Result<State> {
        let folder = result.folder.clone();
        match self.attempt("uid listing", |t| t.list_uids(&folder))? {
            Attempt::Done(mut ids) => {
                ids.sort_by_key(|m| m.uid);
                ids.dedup_by_key(|m| m.uid);
                info!(folder = %folder, messages = ids.len(), "listed folder");
                if ids.is_empty() {
                    Ok(State::Done)
                } else {
                    Ok(State::Matching(ids))
                }
            }
            Attempt::Failed(err) => {
                warn!(folder = %folder, error = %err, "uid listing failed");
                result.errors.push(format!("uid listing failed: {}", err));
                Ok(State::Done)
            }
        }
    }

    fn fetch_and_match(&mut self, ids: &[MessageRef], result: &mut ScanResult) -> Result<State> {
        for batch in plan(ids, self.options.batch_size) {
            result.scanned += batch.len();
            let fetched = match self.attempt("metadata fetch", |t| t.fetch_metadata(batch))? {
                Attempt::Done(fetched) => fetched,
                Attempt::Failed(err) => {
                    warn!(
                        folder = %result.folder,
                        count = batch.len(),
                        error = %err,
                        "metadata fetch failed, skipping batch"
                    );
                    result.extraction_failures += batch.len();
                    result.errors.push(format!(
                        "metadata fetch failed for {} messages ({}): {}",
                        batch.len(),
                        uid_span(batch),
                        err
                    ));
                    continue;
                }
            };
            for msg in batch {
                let Some(sender) = fetched.get(&msg.uid).and_then(extract_metadata) else {
                    warn!(folder = %msg.folder, uid = msg.uid, "no usable sender");
                    result.extraction_failures += 1;
                    continue;
                };
                let Some(rule) = self.rules.first_match(&sender) else {
                    continue;
                };
                debug!(uid = msg.uid, sender = %sender, rule = %rule, "matched");
                result.matched += 1;
                *result.rule_hits.entry(rule.to_string()).or_default() += 1;
                result.matches.push(MatchedMessage {
                    message: msg.clone(),
                    sender: sender.to_string(),
                    rule: rule.to_string(),
                });
            }
        }
        info!(
            folder = %result.folder,
            scanned = result.scanned,
            matched = result.matched,
            extraction_failures = result.extraction_failures,
            "folder scanned"
        );
        Ok(if result.matches.is_empty() {
            State::Done
        } else if self.options.delete {
            State::Deleting
        } else {
            State::DryRunReport
        })
    }

    fn delete_matched(&mut self, result: &mut ScanResult) -> Result<State> {
        let matched: Vec<MessageRef> = result.matches.iter().map(|m| m.message.clone()).collect();
        for batch in plan(&matched, self.options.batch_size) {
            match self.attempt("delete", |t| t.delete(batch))? {
                Attempt::Done(()) => {
                    result.deleted += batch.len();
                    debug!(folder = %result.folder, count = batch.len(), "marked deleted");
                }
                Attempt::Failed(err) => {
                    warn!(
                        folder = %result.folder,
                        count = batch.len(),
                        error = %err,
                        "delete failed, skipping batch"
                    );
                    result.failed_delete_batches += 1;
                    result.errors.push(format!(
                        "delete failed for {} messages ({}): {}",
                        batch.len(),
                        uid_span(batch),
                        err
                    ));
                }
            }
        }
        Ok(if result.deleted > 0 {
            State::Expunging
        } else {
            State::Done
        })
    }

    fn expunge(&mut self, result: &mut ScanResult) -> Result<State> {
        let folder = result.folder.clone();
        match self.attempt("expunge", |t| t.expunge(&folder))? {
            Attempt::Done(()) => {
                result.expunged = true;
                info!(folder = %folder, deleted = result.deleted, "expunged");
            }
            Attempt::Failed(err) => {
                warn!(folder = %folder, error = %err, "expunge failed, messages stay marked");
                result.errors.push(format!("expunge failed: {}", err));
            }
        }
        Ok(State::Done)
    }

    fn attempt<R>(
        &mut self,
        what: &str,
        mut op: impl FnMut(&mut T) -> Result<R>,
    ) -> Result<Attempt<R>> {
        let policy = self.options.retry;
        let mut delay = policy.delay;
        let mut tries = 0;
        loop {
            match op(&mut *self.transport) {
                Ok(value) => return Ok(Attempt::Done(value)),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if tries < policy.retries => {
                    tries += 1;
                    warn!(step = what, attempt = tries, error = %err, "retrying");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                        delay = delay.saturating_mul(2);
                    }
                }
                Err(err) => return Ok(Attempt::Failed(err)),
            }
        }
    }
}

fn uid_span(batch: &[MessageRef]) -> String {
    match (batch.first(), batch.last()) {
        (Some(first), Some(last)) if first.uid != last.uid => {
            format!("uids {}..{}", first.uid, last.uid)
        }
        (Some(first), _) => format!("uid {}", first.uid),
        _ => "no uids".to_string(),
    }
}
