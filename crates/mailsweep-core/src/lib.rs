//! Rule-based mailbox sweeping: sender resolution, rule matching and the
//! batched per-folder scan/delete driver.

pub mod batch;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod sender;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchSize, Batches, DEFAULT_BATCH_SIZE, plan};
pub use error::{Error, Result};
pub use orchestrator::{
    FolderSelector, Orchestrator, SweepConfig, resolve_folders, split_list,
};
pub use report::{MatchedMessage, Mode, RunReport, ScanResult, Totals};
pub use rules::{Rule, RuleSet};
pub use scanner::{Aborted, FolderScanner, RetryPolicy, ScanOptions};
pub use sender::{SenderIdentity, extract};
pub use transport::{EnvelopeAddress, MailTransport, MessageMetadata, MessageRef, Uid};
