use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use mailsweep_core::{
    BatchSize, DEFAULT_BATCH_SIZE, Error as SweepError, FolderSelector, RetryPolicy, RuleSet,
    ScanOptions, SweepConfig, split_list,
};
use mailsweep_mail::{DEFAULT_IMAP_HOST, DEFAULT_IMAP_PORT, ImapConfig};

use super::{ConnectionArgs, ScanCmd};
use crate::load_config_text;

pub(crate) const ENV_USER: &str = "MAILSWEEP_USER";
pub(crate) const ENV_PASS: &str = "MAILSWEEP_PASS";

const DEFAULT_FOLDERS: &str = "INBOX";
const DEFAULT_RETRIES: u32 = 1;
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Everything a run needs, merged from defaults, the config file, the
/// environment and flags, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) skip_tls_verify: bool,
    pub(crate) folders: String,
    pub(crate) skip_folders: Vec<String>,
    pub(crate) rules: Vec<String>,
    pub(crate) batch_size: i64,
    pub(crate) delete: bool,
    pub(crate) retries: u32,
    pub(crate) retry_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_IMAP_HOST.to_string(),
            port: DEFAULT_IMAP_PORT,
            username: None,
            password: None,
            skip_tls_verify: false,
            folders: DEFAULT_FOLDERS.to_string(),
            skip_folders: Vec::new(),
            rules: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE as i64,
            delete: false,
            retries: DEFAULT_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl Settings {
    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(user) = lookup(ENV_USER).filter(|v| !v.trim().is_empty()) {
            self.username = Some(user);
        }
        if let Some(pass) = lookup(ENV_PASS).filter(|v| !v.is_empty()) {
            self.password = Some(pass);
        }
    }

    pub(crate) fn apply_connection(&mut self, args: &ConnectionArgs) {
        if let Some(user) = &args.user {
            self.username = Some(user.clone());
        }
        if let Some(password) = &args.password {
            self.password = Some(password.clone());
        }
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if args.skip_tls_verify {
            self.skip_tls_verify = true;
        }
    }

    pub(crate) fn apply_rules(&mut self, rules: Option<&str>) {
        if let Some(rules) = rules {
            self.rules = split_list(rules);
        }
    }

    pub(crate) fn apply_scan(&mut self, cmd: &ScanCmd) {
        self.apply_connection(&cmd.connection);
        self.apply_rules(cmd.rules.as_deref());
        if let Some(folders) = &cmd.folders {
            self.folders = folders.clone();
        }
        if let Some(skip) = &cmd.skip_folders {
            self.skip_folders = split_list(skip);
        }
        if cmd.delete {
            self.delete = true;
        }
        if let Some(batch) = cmd.batch {
            self.batch_size = batch;
        }
        if let Some(retries) = cmd.retries {
            self.retries = retries;
        }
        if let Some(delay) = cmd.retry_delay_ms {
            self.retry_delay_ms = delay;
        }
    }

    pub(crate) fn rule_set(&self) -> Result<RuleSet> {
        Ok(RuleSet::compile(&self.rules)?)
    }

    pub(crate) fn sweep_config(&self) -> Result<SweepConfig> {
        Ok(SweepConfig {
            folders: FolderSelector::parse(&self.folders),
            skip_folders: self.skip_folders.clone(),
            scan: ScanOptions {
                batch_size: BatchSize::new(self.batch_size)?,
                delete: self.delete,
                retry: RetryPolicy {
                    retries: self.retries,
                    delay: Duration::from_millis(self.retry_delay_ms),
                },
            },
        })
    }

    pub(crate) fn imap_config(&self) -> Result<ImapConfig> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(SweepError::config(format!(
                "set credentials via --user/--password, {} / {} or [imap] in mailsweep.toml",
                ENV_USER, ENV_PASS
            ))
            .into());
        };
        Ok(ImapConfig {
            host: self.host.clone(),
            port: self.port,
            username: username.clone(),
            password: password.clone(),
            skip_tls_verify: self.skip_tls_verify,
        })
    }
}

/// Reads the config file (if any) and the credential environment variables.
pub(crate) fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let mut settings = match load_config_text(explicit)? {
        Some(content) => parse_settings(&content)?,
        None => Settings::default(),
    };
    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

pub(crate) fn parse_settings(content: &str) -> Result<Settings> {
    let value: toml::Value = toml::from_str(content).context("invalid mailsweep.toml")?;
    let mut settings = Settings::default();
    if let Some(imap) = value.get("imap") {
        if let Some(host) = imap.get("host").and_then(|v| v.as_str()) {
            settings.host = host.to_string();
        }
        if let Some(port) = imap.get("port").and_then(|v| v.as_integer()) {
            settings.port =
                u16::try_from(port).map_err(|_| anyhow!("[imap].port out of range: {}", port))?;
        }
        settings.username = imap
            .get("username")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        settings.password = imap
            .get("password")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        settings.skip_tls_verify = imap
            .get("skip_tls_verify")
            .and_then(parse_bool)
            .unwrap_or(false);
    }
    if let Some(sweep) = value.get("sweep") {
        if let Some(folders) = parse_string_list(sweep, "folders") {
            settings.folders = folders.join(",");
        }
        if let Some(skip) = parse_string_list(sweep, "skip_folders") {
            settings.skip_folders = skip;
        }
        if let Some(rules) = parse_string_list(sweep, "rules") {
            settings.rules = rules;
        }
        if let Some(batch) = sweep.get("batch_size").and_then(|v| v.as_integer()) {
            settings.batch_size = batch;
        }
        settings.delete = sweep.get("delete").and_then(parse_bool).unwrap_or(false);
        if let Some(retries) = sweep.get("retries").and_then(|v| v.as_integer()) {
            settings.retries = u32::try_from(retries)
                .map_err(|_| anyhow!("[sweep].retries must not be negative: {}", retries))?;
        }
        if let Some(delay) = sweep.get("retry_delay_ms").and_then(|v| v.as_integer()) {
            settings.retry_delay_ms = u64::try_from(delay)
                .map_err(|_| anyhow!("[sweep].retry_delay_ms must not be negative: {}", delay))?;
        }
    }
    Ok(settings)
}

/// Accepts either a TOML array of strings or one comma-separated string.
fn parse_string_list(value: &toml::Value, key: &str) -> Option<Vec<String>> {
    let item = value.get(key)?;
    if let Some(s) = item.as_str() {
        return Some(split_list(s));
    }
    let list = item.as_array()?;
    let mut out = Vec::new();
    for item in list {
        if let Some(s) = item.as_str() {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
    }
    Some(out)
}

fn parse_bool(value: &toml::Value) -> Option<bool> {
    value.as_bool().or_else(|| {
        value
            .as_str()
            .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
    })
}
