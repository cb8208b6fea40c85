mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, print_error, run_cli};

const LOG_ENV: &str = "MAILSWEEP_LOG";
const DEFAULT_LOG_FILTER: &str = "mailsweep=info,mailsweep_core=info,mailsweep_mail=info";

/// Bad config, bad rules or no session: nothing was scanned.
const EXIT_SETUP_FAILED: u8 = 2;

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let format = cli.command.format();
    match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{:#}", err), "mailsweep failed");
            if let Err(print_err) = print_error(format, &format!("{:#}", err)) {
                eprintln!("error: {}", print_err);
            }
            ExitCode::from(EXIT_SETUP_FAILED)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn xdg_config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn config_path_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("mailsweep.toml"),
        xdg_config_dir().join("mailsweep").join("mailsweep.toml"),
    ]
}

/// An explicit path must be readable; the default locations are optional.
fn load_config_text(explicit: Option<&Path>) -> Result<Option<String>> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        return Ok(Some(content));
    }
    for path in config_path_candidates() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            tracing::debug!(path = %path.display(), "loaded config");
            return Ok(Some(content));
        }
    }
    Ok(None)
}
