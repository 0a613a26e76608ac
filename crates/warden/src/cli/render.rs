//! Human-readable summaries of mode outcomes on stdout.

use std::io::{self, Write};

use crate::engine::{ModeOutcome, StatusReport};
use crate::freeze::{EnforceOutcome, FreezeOutcome, FreezeStatus, UnfreezeOutcome};
use crate::patch::ChangeRecord;
use crate::transaction::TransactionOutcome;

const LOCK_CONTENDED: &str = "another warden invocation holds the lock; nothing to do";

/// Writes the summary of `outcome` to `out`.
pub(crate) fn write_outcome<W: Write>(out: &mut W, outcome: &ModeOutcome) -> io::Result<()> {
    match outcome {
        ModeOutcome::Transaction(outcome) => write_transaction(out, outcome),
        ModeOutcome::Freeze(FreezeOutcome::LockContended)
        | ModeOutcome::Enforce(EnforceOutcome::LockContended)
        | ModeOutcome::Unfreeze(UnfreezeOutcome::LockContended) => {
            writeln!(out, "{LOCK_CONTENDED}")
        }
        ModeOutcome::Freeze(FreezeOutcome::Frozen {
            prefix_lines,
            boundary,
            fingerprint,
        }) => match boundary {
            Some(line) => writeln!(
                out,
                "frozen: {prefix_lines} lines before line {line} ({fingerprint})"
            ),
            None => writeln!(
                out,
                "frozen: whole document, {prefix_lines} lines ({fingerprint})"
            ),
        },
        ModeOutcome::Enforce(EnforceOutcome::NotFrozen) => writeln!(out, "not frozen"),
        ModeOutcome::Enforce(EnforceOutcome::Unchanged) => writeln!(out, "frozen prefix intact"),
        ModeOutcome::Enforce(EnforceOutcome::Restored {
            prefix_lines,
            suffix_lines,
            fingerprint,
        }) => writeln!(
            out,
            "restored {prefix_lines} frozen lines ahead of {suffix_lines} live lines \
             ({fingerprint})"
        ),
        ModeOutcome::Unfreeze(UnfreezeOutcome::Released { removed_files: 0 }) => {
            writeln!(out, "not frozen")
        }
        ModeOutcome::Unfreeze(UnfreezeOutcome::Released { removed_files }) => {
            writeln!(out, "unfrozen: removed {removed_files} state files")
        }
        ModeOutcome::Status(report) => write_status(out, report),
        ModeOutcome::Verify(report) => {
            writeln!(
                out,
                "valid: {} lines, {} bytes",
                report.lines(),
                report.bytes()
            )?;
            for warning in report.warnings() {
                writeln!(out, "warning: {warning}")?;
            }
            Ok(())
        }
    }
}

fn write_transaction<W: Write>(out: &mut W, outcome: &TransactionOutcome) -> io::Result<()> {
    write_changes(out, outcome.changes())?;
    match outcome {
        TransactionOutcome::LockContended => writeln!(out, "{LOCK_CONTENDED}"),
        TransactionOutcome::Unchanged { .. } => writeln!(out, "unchanged; no restart"),
        TransactionOutcome::Restarted { fingerprint, .. } => {
            writeln!(out, "applied {} edits; restarted ({fingerprint})", edits(outcome))
        }
        TransactionOutcome::DryRun { .. } => {
            writeln!(out, "dry run: {} edits pending", edits(outcome))
        }
    }
}

fn write_changes<W: Write>(out: &mut W, changes: &[ChangeRecord]) -> io::Result<()> {
    for change in changes {
        writeln!(out, "  {change}")?;
    }
    Ok(())
}

fn edits(outcome: &TransactionOutcome) -> usize {
    outcome
        .changes()
        .iter()
        .filter(|change| change.is_edit())
        .count()
}

fn write_status<W: Write>(out: &mut W, report: &StatusReport) -> io::Result<()> {
    match &report.freeze {
        FreezeStatus::Unfrozen => writeln!(out, "freeze: unfrozen")?,
        FreezeStatus::Frozen {
            prefix_lines,
            prefix_bytes,
            ..
        } => writeln!(
            out,
            "freeze: frozen ({prefix_lines} lines, {prefix_bytes} bytes)"
        )?,
    }
    match &report.document {
        Some(fingerprint) => writeln!(out, "document: {fingerprint}")?,
        None => writeln!(out, "document: missing")?,
    }
    match &report.applied {
        Some(fingerprint) => writeln!(out, "applied: {fingerprint}")?,
        None => writeln!(out, "applied: none")?,
    }
    writeln!(out, "drift: {}", if report.drifted() { "yes" } else { "no" })
}
