use std::fmt::Write as _;

use anyhow::Result;
use mailsweep_core::{Mode, RuleSet, RunReport, ScanResult};
use serde_json::{Value as JsonValue, json};

use super::OutputFormat;

pub(crate) const CLI_SCHEMA_VERSION: &str = "mailsweep.cli.v1";

const RULE_COLUMN: usize = 55;

pub(crate) fn output_ok(value: JsonValue) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(&json!({
            "schema": CLI_SCHEMA_VERSION,
            "ok": true,
            "result": value
        }))?
    );
    Ok(())
}

pub(crate) fn output_error(message: &str) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(&json!({
            "schema": CLI_SCHEMA_VERSION,
            "ok": false,
            "error": message
        }))?
    );
    Ok(())
}

/// Reports a failure that happened before any scanning, in the requested format.
pub(crate) fn print_error(format: OutputFormat, message: &str) -> Result<()> {
    match format {
        OutputFormat::Json => output_error(message),
        OutputFormat::Text => {
            eprintln!("error: {}", message);
            Ok(())
        }
    }
}

pub(crate) fn render_header(server: &str, folders: &str, mode: Mode, rules: &RuleSet) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Server: {} SSL | Folders: {} | Mode: {}",
        server,
        folders,
        mode.label()
    );
    out.push_str(&render_rules(rules));
    out.push('\n');
    out
}

pub(crate) fn render_rules(rules: &RuleSet) -> String {
    let mut out = String::from("Rules:\n");
    for rule in rules {
        let _ = writeln!(out, "  {}  ({})", rule, rule.kind());
    }
    out
}

pub(crate) fn rules_to_json(rules: &RuleSet) -> JsonValue {
    json!(rules.iter().collect::<Vec<_>>())
}

/// Human-readable run report. Folders with nothing matched and no errors
/// are left out; the summary still covers them.
pub(crate) fn render_report(report: &RunReport, rules: &RuleSet, show_matches: bool) -> String {
    let mut out = String::new();
    for folder in &report.folders {
        if folder.matched == 0 && !folder.has_errors() && folder.extraction_failures == 0 {
            continue;
        }
        render_folder(&mut out, folder, rules, report.mode, show_matches);
    }

    if let Some(reason) = &report.aborted {
        let _ = writeln!(out, "[ABORT] Run stopped early: {}\n", reason);
    }

    let totals = &report.totals;
    out.push_str("=== SUMMARY ===\n");
    let _ = writeln!(out, "Folders processed: {}", totals.folders);
    let _ = writeln!(out, "Messages scanned: {}", totals.scanned);
    let _ = writeln!(
        out,
        "Total unique matched (across processed folders): {}",
        totals.matched
    );
    if report.mode == Mode::Delete {
        let _ = writeln!(out, "Total deleted: {}", totals.deleted);
    }
    if totals.extraction_failures > 0 {
        let _ = writeln!(out, "Sender unresolved: {}", totals.extraction_failures);
    }
    if totals.folders_with_errors > 0 {
        let _ = writeln!(out, "Folders with errors: {}", totals.folders_with_errors);
    }
    out.push_str("Counts by rule:\n");
    for rule in rules {
        let hits = report.rule_hits.get(rule.pattern()).copied().unwrap_or(0);
        let _ = writeln!(out, "  {:width$}: {}", rule.pattern(), hits, width = RULE_COLUMN);
    }
    out
}

fn render_folder(
    out: &mut String,
    folder: &ScanResult,
    rules: &RuleSet,
    mode: Mode,
    show_matches: bool,
) {
    let _ = writeln!(out, "Folder: {}", folder.folder);
    for rule in rules {
        if let Some(hits) = folder.rule_hits.get(rule.pattern()) {
            let _ = writeln!(out, "  {:width$}: {}", rule.pattern(), hits, width = RULE_COLUMN);
        }
    }
    let _ = writeln!(out, "  -> Unique matched in folder: {}", folder.matched);
    if folder.extraction_failures > 0 {
        let _ = writeln!(
            out,
            "  (note: {} messages had no resolvable sender; skipped)",
            folder.extraction_failures
        );
    }
    if show_matches {
        for m in &folder.matches {
            let _ = writeln!(out, "    uid {:>8}  {}  [{}]", m.message.uid, m.sender, m.rule);
        }
    }
    for err in &folder.errors {
        let _ = writeln!(out, "  [WARN] {}", err);
    }
    if mode == Mode::Delete {
        let _ = writeln!(out, "  Deleted: {}", folder.deleted);
        if folder.failed_delete_batches > 0 {
            let _ = writeln!(
                out,
                "  Failed delete batches: {}",
                folder.failed_delete_batches
            );
        }
    } else if folder.matched > 0 {
        out.push_str("  (dry-run: nothing deleted)\n");
    }
    out.push('\n');
}

pub(crate) fn emit(
    format: OutputFormat,
    text: impl FnOnce() -> String,
    value: impl FnOnce() -> JsonValue,
) -> Result<()> {
    match format {
        OutputFormat::Json => output_ok(value()),
        OutputFormat::Text => {
            print!("{}", text());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use mailsweep_core::{MatchedMessage, MessageRef, Mode, RuleSet, RunReport, ScanResult};

    use super::{render_report, render_rules, rules_to_json};

    fn rules() -> RuleSet {
        RuleSet::compile(["ozon.ru", "*mvideo.ru"]).unwrap()
    }

    fn inbox() -> ScanResult {
        let mut result = ScanResult::new("INBOX");
        result.scanned = 10;
        result.matched = 2;
        result.rule_hits.insert("ozon.ru".to_string(), 2);
        result.matches.push(MatchedMessage {
            message: MessageRef::new("INBOX", 42),
            sender: "news@ozon.ru".to_string(),
            rule: "ozon.ru".to_string(),
        });
        result
    }

    #[test]
    fn dry_run_report_mentions_nothing_deleted() {
        let mut report = RunReport::new(Mode::DryRun);
        report.push(inbox());
        report.push(ScanResult::new("Spam"));

        let text = render_report(&report, &rules(), false);
        assert!(text.contains("Folder: INBOX"));
        assert!(!text.contains("Folder: Spam"));
        assert!(text.contains("-> Unique matched in folder: 2"));
        assert!(text.contains("(dry-run: nothing deleted)"));
        assert!(!text.contains("Total deleted"));
        assert!(text.contains("=== SUMMARY ==="));
        assert!(text.contains("Folders processed: 2"));
        assert!(!text.contains("uid"));
    }

    #[test]
    fn delete_report_lists_deletions_and_errors() {
        let mut report = RunReport::new(Mode::Delete);
        let mut inbox = inbox();
        inbox.deleted = 1;
        inbox.failed_delete_batches = 1;
        inbox.errors.push("delete of uids 42..42 failed".to_string());
        report.push(inbox);
        report.aborted = Some("connection lost".to_string());

        let text = render_report(&report, &rules(), true);
        assert!(text.contains("  Deleted: 1"));
        assert!(text.contains("Failed delete batches: 1"));
        assert!(text.contains("[WARN] delete of uids 42..42 failed"));
        assert!(text.contains("[ABORT] Run stopped early: connection lost"));
        assert!(text.contains("Total deleted: 1"));
        assert!(text.contains("news@ozon.ru"));
    }

    #[test]
    fn summary_lists_every_rule_even_without_hits() {
        let report = RunReport::new(Mode::DryRun);
        let text = render_report(&report, &rules(), false);
        let summary = text.split("Counts by rule:\n").nth(1).unwrap();
        assert!(summary.contains("ozon.ru"));
        assert!(summary.contains("*mvideo.ru"));
    }

    #[test]
    fn rules_listing_shows_kind() {
        let text = render_rules(&rules());
        assert!(text.contains("  ozon.ru  (domain)"));
        assert!(text.contains("  *mvideo.ru  (host-mask)"));
        let json = rules_to_json(&rules());
        assert_eq!(json[1]["kind"], "host-mask");
    }
}
