//! Sender resolution from envelope data with a `From:` header fallback.

use std::fmt;

use mailparse::{MailAddr, addrparse};
use serde::Serialize;

use crate::transport::{EnvelopeAddress, MessageMetadata};

/// Lower-cased `local@host` address of a message's sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SenderIdentity(String);

impl SenderIdentity {
    /// Normalizes `raw` and accepts it only if it has exactly one `@` with
    /// something on both sides and no whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let addr = raw.trim().to_lowercase();
        if addr.chars().any(|c| c.is_whitespace() || c == '<' || c == '>') {
            return None;
        }
        let (local, host) = addr.split_once('@')?;
        if local.is_empty() || host.is_empty() || host.contains('@') {
            return None;
        }
        Some(Self(addr))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0.rsplit_once('@').map(|(_, host)| host).unwrap_or("")
    }
}

impl fmt::Display for SenderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the sender of one message.
///
/// The first envelope `From` address wins when it is well formed; otherwise
/// the raw header block is searched for a `From:` line and its first address
/// is used. `None` means neither source produced a usable address.
pub fn extract(
    envelope_from: Option<&[EnvelopeAddress]>,
    raw_header: Option<&[u8]>,
) -> Option<SenderIdentity> {
    envelope_from
        .and_then(from_envelope)
        .or_else(|| raw_header.and_then(from_header_block))
}

pub fn extract_metadata(meta: &MessageMetadata) -> Option<SenderIdentity> {
    extract(meta.envelope_from.as_deref(), meta.raw_header.as_deref())
}

fn from_envelope(addrs: &[EnvelopeAddress]) -> Option<SenderIdentity> {
    let first = addrs.first()?;
    let mailbox = first.mailbox.as_deref().map(str::trim).unwrap_or("");
    let host = first.host.as_deref().map(str::trim).unwrap_or("");
    if mailbox.is_empty() || host.is_empty() {
        return None;
    }
    SenderIdentity::parse(&format!("{}@{}", mailbox, host))
}

fn from_header_block(raw: &[u8]) -> Option<SenderIdentity> {
    let value = header_value(raw, "From")?;
    first_address(&value).and_then(|addr| SenderIdentity::parse(&addr))
}

fn header_value(raw: &[u8], name: &str) -> Option<String> {
    let (headers, _) = mailparse::parse_headers(raw).ok()?;
    for header in headers.iter() {
        if header.get_key_ref().eq_ignore_ascii_case(name) {
            return Some(header.get_value());
        }
    }
    None
}

fn first_address(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match addrparse(trimmed) {
        Ok(list) => list.iter().find_map(|addr| match addr {
            MailAddr::Single(info) => Some(info.addr.clone()),
            MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
        }),
        Err(_) => Some(angle_or_bare(trimmed)),
    }
}

fn angle_or_bare(input: &str) -> String {
    if let (Some(start), Some(end)) = (input.find('<'), input.find('>')) {
        if start < end {
            return input[start + 1..end].trim().to_string();
        }
    }
    input.to_string()
}
