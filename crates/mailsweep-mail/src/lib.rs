//! IMAP session backing the sweep engine.

use std::collections::HashMap;

use imap::{ClientBuilder, ConnectionMode};
use mailsweep_core::{
    EnvelopeAddress, Error, MailTransport, MessageMetadata, MessageRef, Result, Uid,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_IMAP_HOST: &str = "imap.rambler.ru";
pub const DEFAULT_IMAP_PORT: u16 = 993;

const METADATA_QUERY: &str = "(UID ENVELOPE BODY.PEEK[HEADER.FIELDS (FROM)])";
const DELETE_FLAGS: &str = "+FLAGS.SILENT (\\Deleted)";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub skip_tls_verify: bool,
}

/// One authenticated IMAP session. Every call goes over the same
/// connection, in order.
pub struct ImapTransport {
    session: imap::Session<imap::Connection>,
    selected: Option<String>,
}

impl ImapTransport {
    pub fn connect(imap: &ImapConfig) -> Result<Self> {
        debug!(host = %imap.host, port = imap.port, "imap connect");
        let client = ClientBuilder::new(imap.host.as_str(), imap.port)
            .tls_kind(imap::TlsKind::Native)
            .mode(ConnectionMode::AutoTls)
            .danger_skip_tls_verify(imap.skip_tls_verify)
            .connect()
            .map_err(|e| {
                Error::Connection(format!("connect to {}:{} failed: {}", imap.host, imap.port, e))
            })?;
        let session = client
            .login(&imap.username, &imap.password)
            .map_err(|(e, _)| Error::Connection(format!("login failed: {}", e)))?;
        info!(host = %imap.host, user = %imap.username, "imap login ok");
        Ok(Self {
            session,
            selected: None,
        })
    }

    pub fn logout(mut self) {
        if let Err(err) = self.session.logout() {
            debug!(error = %err, "imap logout failed");
        }
    }

    fn require_selected(&self, folder: &str) -> Result<()> {
        match self.selected.as_deref() {
            Some(selected) if selected == folder => Ok(()),
            _ => Err(Error::protocol(format!("folder '{}' is not selected", folder))),
        }
    }
}

impl MailTransport for ImapTransport {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        let list = self.session.list(None, Some("*")).map_err(classify)?;
        debug!(raw_count = list.len(), "imap list");
        Ok(list
            .iter()
            .filter(|name| {
                !name
                    .attributes()
                    .iter()
                    .any(|attr| matches!(attr, imap_proto::NameAttribute::NoSelect))
            })
            .map(|name| name.name().to_string())
            .collect())
    }

    fn select(&mut self, folder: &str, read_only: bool) -> Result<()> {
        self.selected = None;
        let opened = if read_only {
            self.session.examine(folder)
        } else {
            self.session.select(folder)
        };
        let mailbox = opened.map_err(|e| match classify(e) {
            Error::Protocol(reason) => Error::folder(folder, reason),
            other => other,
        })?;
        debug!(folder, exists = mailbox.exists, read_only, "imap select");
        self.selected = Some(folder.to_string());
        Ok(())
    }

    fn list_uids(&mut self, folder: &str) -> Result<Vec<MessageRef>> {
        self.require_selected(folder)?;
        let uids = self.session.uid_search("ALL").map_err(classify)?;
        let mut uids: Vec<Uid> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids
            .into_iter()
            .map(|uid| MessageRef::new(folder, uid))
            .collect())
    }

    fn fetch_metadata(&mut self, batch: &[MessageRef]) -> Result<HashMap<Uid, MessageMetadata>> {
        if batch.is_empty() {
            return Ok(HashMap::new());
        }
        debug!(count = batch.len(), "imap uid_fetch");
        let fetches = self
            .session
            .uid_fetch(uid_set(batch), METADATA_QUERY)
            .map_err(classify)?;
        let mut out = HashMap::with_capacity(batch.len());
        for fetch in fetches.iter() {
            let Some(uid) = fetch.uid else {
                continue;
            };
            let envelope_from = fetch
                .envelope()
                .and_then(|env| env.from.as_ref())
                .map(|addrs| addrs.iter().map(envelope_address).collect());
            let raw_header = fetch.header().map(<[u8]>::to_vec);
            out.insert(
                uid,
                MessageMetadata {
                    envelope_from,
                    raw_header,
                },
            );
        }
        Ok(out)
    }

    fn delete(&mut self, batch: &[MessageRef]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        debug!(count = batch.len(), "imap uid_store deleted");
        self.session
            .uid_store(uid_set(batch), DELETE_FLAGS)
            .map_err(classify)?;
        Ok(())
    }

    fn expunge(&mut self, folder: &str) -> Result<()> {
        self.require_selected(folder)?;
        self.session.expunge().map_err(classify)?;
        Ok(())
    }
}

/// Session-level failures end the run; anything else is a failed command.
/// A timed-out read leaves the session usable, so it is retried like any
/// other failed command.
fn classify(err: imap::Error) -> Error {
    match &err {
        imap::Error::Io(io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) =>
        {
            Error::Protocol(err.to_string())
        }
        imap::Error::Io(_) | imap::Error::ConnectionLost | imap::Error::Bye(_) => {
            Error::Connection(err.to_string())
        }
        _ => Error::Protocol(err.to_string()),
    }
}

fn envelope_address(addr: &imap_proto::Address<'_>) -> EnvelopeAddress {
    EnvelopeAddress {
        name: addr.name.as_deref().map(lossy),
        mailbox: addr.mailbox.as_deref().map(lossy),
        host: addr.host.as_deref().map(lossy),
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn uid_set(batch: &[MessageRef]) -> String {
    batch
        .iter()
        .map(|m| m.uid.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
