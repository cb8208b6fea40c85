//! The session surface the sweep engine drives.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Result;

pub type Uid = u32;

/// A message addressed by folder and UID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageRef {
    pub folder: String,
    pub uid: Uid,
}

impl MessageRef {
    pub fn new(folder: impl Into<String>, uid: Uid) -> Self {
        Self {
            folder: folder.into(),
            uid,
        }
    }
}

/// One address out of an envelope `From` list, fields as sent by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeAddress {
    pub name: Option<String>,
    pub mailbox: Option<String>,
    pub host: Option<String>,
}

impl EnvelopeAddress {
    pub fn new(mailbox: &str, host: &str) -> Self {
        Self {
            name: None,
            mailbox: Some(mailbox.to_string()),
            host: Some(host.to_string()),
        }
    }
}

/// What a metadata fetch returns for a single UID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageMetadata {
    pub envelope_from: Option<Vec<EnvelopeAddress>>,
    pub raw_header: Option<Vec<u8>>,
}

/// A stateful mail session.
///
/// Calls are issued strictly one after another; `select` changes which folder
/// the following `list_uids`, `fetch_metadata`, `delete` and `expunge` act on.
pub trait MailTransport {
    /// Selectable folders in server order.
    fn list_folders(&mut self) -> Result<Vec<String>>;

    /// Opens `folder`. Read-only selection must not allow flag changes.
    fn select(&mut self, folder: &str, read_only: bool) -> Result<()>;

    /// Every UID in the selected folder.
    fn list_uids(&mut self, folder: &str) -> Result<Vec<MessageRef>>;

    /// Envelope and header data for a batch. UIDs the server did not answer
    /// for are simply absent from the map.
    fn fetch_metadata(&mut self, batch: &[MessageRef]) -> Result<HashMap<Uid, MessageMetadata>>;

    /// Marks a batch as deleted.
    fn delete(&mut self, batch: &[MessageRef]) -> Result<()>;

    /// Permanently removes every marked message in `folder`.
    fn expunge(&mut self, folder: &str) -> Result<()>;
}
