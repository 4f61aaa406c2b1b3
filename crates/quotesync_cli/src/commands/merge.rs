//! Merge command implementation.

use super::{merge_config, read_quote, write_json};
use quotesync_core::{
    fingerprint, ConflictKind, FieldClass, MergeEngine, MergeOutcome, Relationship, Side,
};
use serde::Serialize;
use std::path::Path;

/// Options for the merge command.
#[derive(Debug, Clone)]
pub struct MergeOptions<'a> {
    /// Device performing the merge.
    pub device: &'a str,
    /// Classification file; the standard table if absent.
    pub classification: Option<&'a Path>,
    /// Fail on unclassified fields.
    pub strict: bool,
    /// Where to write the full outcome.
    pub out: Option<&'a Path>,
}

/// Merge summary.
#[derive(Debug, Serialize)]
pub struct MergeSummary {
    /// Quote id.
    pub quote_id: String,
    /// Relationship of local to remote.
    pub relationship: Relationship,
    /// Outcome label.
    pub outcome: &'static str,
    /// Paths settled by last-writer-wins.
    pub auto_merged: Vec<AutoMergedView>,
    /// Paths that need a choice.
    pub conflicts: Vec<ConflictView>,
    /// True if the caller must recompute derived totals.
    pub recompute_financials: bool,
    /// Fingerprint of the settled record, if the merge settled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// One auto-merged path.
#[derive(Debug, Serialize)]
pub struct AutoMergedView {
    /// The path.
    pub path: String,
    /// Side whose value was kept.
    pub winner: Side,
}

/// One reported conflict.
#[derive(Debug, Serialize)]
pub struct ConflictView {
    /// The path.
    pub path: String,
    /// Why it was raised.
    pub kind: ConflictKind,
    /// Field class.
    pub class: FieldClass,
    /// True if the path feeds pricing.
    pub affects_cost: bool,
    /// Local candidate, rendered.
    pub local: String,
    /// Remote candidate, rendered.
    pub remote: String,
}

/// Merges two quote files and returns the outcome with its summary.
pub fn execute(
    local: &Path,
    remote: &Path,
    options: &MergeOptions<'_>,
) -> Result<(MergeOutcome, MergeSummary), Box<dyn std::error::Error>> {
    let local = read_quote(local)?;
    let remote = read_quote(remote)?;
    let engine = MergeEngine::new(merge_config(
        options.device,
        options.classification,
        options.strict,
    )?);

    let relationship = engine.compare_clocks(&local.clock, &remote.clock);
    let outcome = engine.attempt_merge(&local, &remote)?;

    let mut summary = MergeSummary {
        quote_id: local.id.to_string(),
        relationship,
        outcome: outcome.label(),
        auto_merged: Vec::new(),
        conflicts: Vec::new(),
        recompute_financials: false,
        fingerprint: None,
    };

    match &outcome {
        MergeOutcome::Replace(_) => {}
        MergeOutcome::Merged(merged) => {
            summary.auto_merged = merged
                .auto_merged
                .iter()
                .map(|a| AutoMergedView {
                    path: a.path.to_string(),
                    winner: a.winner,
                })
                .collect();
            summary.recompute_financials = merged.recompute_financials;
        }
        MergeOutcome::NeedsResolution { report, .. } => {
            summary.auto_merged = report
                .auto_merged
                .iter()
                .map(|a| AutoMergedView {
                    path: a.path.to_string(),
                    winner: a.winner,
                })
                .collect();
            summary.conflicts = report
                .entries
                .iter()
                .map(|e| ConflictView {
                    path: e.path.to_string(),
                    kind: e.kind,
                    class: e.class,
                    affects_cost: e.affects_cost,
                    local: e.local.to_string(),
                    remote: e.remote.to_string(),
                })
                .collect();
            summary.recompute_financials = report.touches_cost();
        }
    }

    if let Some(settled) = outcome.settled(&local, &remote) {
        summary.fingerprint = Some(fingerprint(&settled)?.to_string());
    }

    if let Some(out) = options.out {
        write_json(out, &outcome)?;
        tracing::info!(path = %out.display(), outcome = outcome.label(), "wrote merge outcome");
    }

    Ok((outcome, summary))
}

/// Runs the merge command.
pub fn run(
    local: &Path,
    remote: &Path,
    options: &MergeOptions<'_>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, summary) = execute(local, remote, options)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            print_text_output(&summary);
        }
    }

    Ok(())
}

fn print_text_output(summary: &MergeSummary) {
    println!("Quote: {}", summary.quote_id);
    println!("Relationship: {}", summary.relationship);
    println!("Outcome: {}", summary.outcome);

    if !summary.auto_merged.is_empty() {
        println!();
        println!("Auto-merged ({}):", summary.auto_merged.len());
        for a in &summary.auto_merged {
            println!("  {:<32} {}", a.path, a.winner);
        }
    }

    if !summary.conflicts.is_empty() {
        println!();
        println!("Conflicts ({}):", summary.conflicts.len());
        for c in &summary.conflicts {
            let kind = match c.kind {
                ConflictKind::Diverged => "diverged",
                ConflictKind::RemovedVsEdited => "removed vs edited",
            };
            let cost = if c.affects_cost { ", cost" } else { "" };
            println!("  {} ({kind}{cost})", c.path);
            println!("    local:  {}", c.local);
            println!("    remote: {}", c.remote);
        }
    }

    if summary.recompute_financials {
        println!();
        println!("Financials must be recomputed.");
    }
    if let Some(fp) = &summary.fingerprint {
        println!("Fingerprint: {fp}");
    }
}
