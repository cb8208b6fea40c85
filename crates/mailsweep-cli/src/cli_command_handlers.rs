use std::fmt::Write as _;
use std::process::ExitCode;

use anyhow::Result;
use mailsweep_core::{MailTransport, Mode, Orchestrator};
use mailsweep_mail::ImapTransport;
use serde_json::json;
use tracing::info;

use super::cli_config::{Settings, load_settings};
use super::cli_runtime_helpers::{emit, render_header, render_report, render_rules, rules_to_json};
use super::{Cli, CliCommand, FoldersCmd, OutputFormat, RulesCmd, ScanCmd};

/// Some folder failed or the session dropped midway.
const EXIT_INCOMPLETE: u8 = 1;

pub(crate) fn run_cli(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(cli.config.as_deref())?;
    match cli.command {
        CliCommand::Scan(cmd) => run_scan(settings, &cmd),
        CliCommand::Folders(cmd) => run_folders(settings, &cmd),
        CliCommand::Rules(cmd) => run_rules(settings, &cmd),
    }
}

fn run_scan(mut settings: Settings, cmd: &ScanCmd) -> Result<ExitCode> {
    settings.apply_scan(cmd);
    // Everything that can be rejected offline is checked before connecting.
    let rules = settings.rule_set()?;
    let sweep = settings.sweep_config()?;
    let imap = settings.imap_config()?;
    let mode = Mode::from_delete_flag(sweep.scan.delete);

    if cmd.format == OutputFormat::Text {
        let server = format!("{}:{}", imap.host, imap.port);
        print!("{}", render_header(&server, &settings.folders, mode, &rules));
    }

    let mut transport = ImapTransport::connect(&imap)?;
    let report = Orchestrator::new(&mut transport, &rules, &sweep).run();
    transport.logout();
    let report = report?;

    emit(
        cmd.format,
        || render_report(&report, &rules, cmd.show_matches),
        || json!(report),
    )?;
    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        info!(
            folders_with_errors = report.totals.folders_with_errors,
            aborted = report.aborted.is_some(),
            "sweep incomplete"
        );
        Ok(ExitCode::from(EXIT_INCOMPLETE))
    }
}

fn run_folders(mut settings: Settings, cmd: &FoldersCmd) -> Result<ExitCode> {
    settings.apply_connection(&cmd.connection);
    let imap = settings.imap_config()?;
    let mut transport = ImapTransport::connect(&imap)?;
    let folders = transport.list_folders();
    transport.logout();
    let folders = folders?;

    emit(
        cmd.format,
        || {
            let mut out = String::from("Selectable folders:\n");
            for folder in &folders {
                let _ = writeln!(out, " - {}", folder);
            }
            out
        },
        || json!(folders),
    )?;
    Ok(ExitCode::SUCCESS)
}

fn run_rules(mut settings: Settings, cmd: &RulesCmd) -> Result<ExitCode> {
    settings.apply_rules(cmd.rules.as_deref());
    let rules = settings.rule_set()?;
    emit(cmd.format, || render_rules(&rules), || rules_to_json(&rules))?;
    Ok(ExitCode::SUCCESS)
}
