use std::collections::{HashMap, HashSet};

use crate::transport::{EnvelopeAddress, MailTransport, MessageMetadata, MessageRef, Uid};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ListFolders,
    Select(String, bool),
    ListUids(String),
    Fetch(Vec<Uid>),
    Delete(Vec<Uid>),
    Expunge(String),
}

/// In-memory session that records every call and fails on request.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    folders: Vec<String>,
    messages: HashMap<String, Vec<(Uid, MessageMetadata)>>,
    selected: Option<String>,
    pub calls: Vec<Call>,
    pub marked: HashSet<MessageRef>,
    fetch_failures: HashMap<Uid, usize>,
    delete_failures: HashMap<Uid, usize>,
    pub list_failures: usize,
    pub expunge_failures: usize,
    pub unselectable: HashSet<String>,
    pub drop_connection_on_fetch: bool,
    pub drop_connection_on_list_folders: bool,
    pub omit_from_fetch: HashSet<Uid>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a folder whose messages carry envelope senders.
    pub fn folder(mut self, name: &str, senders: &[(Uid, &str)]) -> Self {
        let messages = senders
            .iter()
            .map(|(uid, from)| (*uid, envelope(from)))
            .collect();
        self.folders.push(name.to_string());
        self.messages.insert(name.to_string(), messages);
        self
    }

    pub fn message(mut self, folder: &str, uid: Uid, meta: MessageMetadata) -> Self {
        if !self.folders.iter().any(|f| f == folder) {
            self.folders.push(folder.to_string());
        }
        self.messages
            .entry(folder.to_string())
            .or_default()
            .push((uid, meta));
        self
    }

    pub fn fail_fetch(mut self, uid: Uid, times: usize) -> Self {
        self.fetch_failures.insert(uid, times);
        self
    }

    pub fn fail_delete(mut self, uid: Uid, times: usize) -> Self {
        self.delete_failures.insert(uid, times);
        self
    }

    pub fn fetches(&self) -> Vec<Vec<Uid>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Fetch(uids) => Some(uids.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<Vec<Uid>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Delete(uids) => Some(uids.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn expunges(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Expunge(_)))
            .count()
    }

    fn take_failure(failures: &mut HashMap<Uid, usize>, batch: &[MessageRef]) -> bool {
        for msg in batch {
            if let Some(left) = failures.get_mut(&msg.uid) {
                if *left > 0 {
                    *left -= 1;
                    return true;
                }
            }
        }
        false
    }
}

pub(crate) fn envelope(from: &str) -> MessageMetadata {
    let (mailbox, host) = from.split_once('@').unwrap_or((from, ""));
    MessageMetadata {
        envelope_from: Some(vec![EnvelopeAddress::new(mailbox, host)]),
        raw_header: None,
    }
}

impl MailTransport for FakeTransport {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        self.calls.push(Call::ListFolders);
        if self.drop_connection_on_list_folders {
            return Err(Error::Connection("connection reset by peer".to_string()));
        }
        Ok(self.folders.clone())
    }

    fn select(&mut self, folder: &str, read_only: bool) -> Result<()> {
        self.calls.push(Call::Select(folder.to_string(), read_only));
        if self.unselectable.contains(folder) || !self.messages.contains_key(folder) {
            return Err(Error::folder(folder, "NO Mailbox doesn't exist"));
        }
        self.selected = Some(folder.to_string());
        Ok(())
    }

    fn list_uids(&mut self, folder: &str) -> Result<Vec<MessageRef>> {
        self.calls.push(Call::ListUids(folder.to_string()));
        if self.list_failures > 0 {
            self.list_failures -= 1;
            return Err(Error::protocol("NO [INUSE] mailbox busy"));
        }
        let messages = self.messages.get(folder).cloned().unwrap_or_default();
        Ok(messages
            .iter()
            .map(|(uid, _)| MessageRef::new(folder, *uid))
            .collect())
    }

    fn fetch_metadata(&mut self, batch: &[MessageRef]) -> Result<HashMap<Uid, MessageMetadata>> {
        self.calls
            .push(Call::Fetch(batch.iter().map(|m| m.uid).collect()));
        if self.drop_connection_on_fetch {
            return Err(Error::Connection("BYE server shutting down".to_string()));
        }
        if Self::take_failure(&mut self.fetch_failures, batch) {
            return Err(Error::protocol("NO [UNAVAILABLE] fetch failed"));
        }
        let folder = self.selected.clone().unwrap_or_default();
        let wanted: HashSet<Uid> = batch.iter().map(|m| m.uid).collect();
        Ok(self
            .messages
            .get(&folder)
            .map(|msgs| {
                msgs.iter()
                    .filter(|(uid, _)| wanted.contains(uid) && !self.omit_from_fetch.contains(uid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete(&mut self, batch: &[MessageRef]) -> Result<()> {
        self.calls
            .push(Call::Delete(batch.iter().map(|m| m.uid).collect()));
        if Self::take_failure(&mut self.delete_failures, batch) {
            return Err(Error::protocol("NO store failed"));
        }
        self.marked.extend(batch.iter().cloned());
        Ok(())
    }

    fn expunge(&mut self, folder: &str) -> Result<()> {
        self.calls.push(Call::Expunge(folder.to_string()));
        if self.expunge_failures > 0 {
            self.expunge_failures -= 1;
            return Err(Error::protocol("NO expunge failed"));
        }
        Ok(())
    }
}
