use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[path = "cli_command_handlers.rs"]
mod cli_command_handlers;
#[path = "cli_config.rs"]
mod cli_config;
#[path = "cli_runtime_helpers.rs"]
mod cli_runtime_helpers;
pub(crate) use cli_command_handlers::run_cli;
pub(crate) use cli_runtime_helpers::print_error;

#[derive(Parser, Debug)]
#[command(
    name = "mailsweep",
    version,
    about = "Delete mail from unwanted senders over IMAP (dry-run unless --delete)"
)]
pub(crate) struct Cli {
    /// Config file (default: ./mailsweep.toml, then $XDG_CONFIG_HOME/mailsweep/mailsweep.toml)
    #[arg(short = 'c', long = "config", global = true)]
    pub(crate) config: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// Scan folders, report matches and optionally delete them
    Scan(ScanCmd),
    /// List selectable folders and exit
    Folders(FoldersCmd),
    /// Show how each rule is classified, without connecting
    Rules(RulesCmd),
}

impl CliCommand {
    pub(crate) fn format(&self) -> OutputFormat {
        match self {
            Self::Scan(cmd) => cmd.format,
            Self::Folders(cmd) => cmd.format,
            Self::Rules(cmd) => cmd.format,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ConnectionArgs {
    /// Login (or env MAILSWEEP_USER)
    #[arg(long)]
    pub(crate) user: Option<String>,
    /// Password or app password (or env MAILSWEEP_PASS)
    #[arg(long)]
    pub(crate) password: Option<String>,
    /// IMAP server (default imap.rambler.ru)
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// IMAP port (default 993, implicit TLS)
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Accept invalid TLS certificates
    #[arg(long)]
    pub(crate) skip_tls_verify: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScanCmd {
    #[command(flatten)]
    pub(crate) connection: ConnectionArgs,
    /// Comma-separated folders ("INBOX,Spam") or "*" for all
    #[arg(long)]
    pub(crate) folders: Option<String>,
    /// Comma-separated folders to leave alone, e.g. "Sent Messages,Drafts,Trash"
    #[arg(long = "skip-folders")]
    pub(crate) skip_folders: Option<String>,
    /// Comma-separated rules: "ozon.ru" (domain and subdomains), "*mvideo.ru"
    /// (host mask), "noreply_*@privaterelay.appleid.com" (address mask)
    #[arg(long, visible_alias = "domains")]
    pub(crate) rules: Option<String>,
    /// Actually delete matches (otherwise dry-run)
    #[arg(long)]
    pub(crate) delete: bool,
    /// Batch size for fetch and delete
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) batch: Option<i64>,
    /// Extra attempts for a failed batch
    #[arg(long)]
    pub(crate) retries: Option<u32>,
    /// Delay before the first retry, doubled after each failure
    #[arg(long = "retry-delay-ms")]
    pub(crate) retry_delay_ms: Option<u64>,
    /// List every matched message in text output
    #[arg(long = "show-matches")]
    pub(crate) show_matches: bool,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub(crate) format: OutputFormat,
}

#[derive(Args, Debug)]
pub(crate) struct FoldersCmd {
    #[command(flatten)]
    pub(crate) connection: ConnectionArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub(crate) format: OutputFormat,
}

#[derive(Args, Debug)]
pub(crate) struct RulesCmd {
    #[arg(long, visible_alias = "domains")]
    pub(crate) rules: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub(crate) format: OutputFormat,
}
