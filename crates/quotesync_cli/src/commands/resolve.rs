//! Resolve command implementation.

use super::{read_json, write_json, CliError};
use quotesync_core::{fingerprint, ChoiceMap, MergeConfig, MergeEngine, MergeOutcome, Quote};
use serde::Serialize;
use std::path::Path;

/// Resolution summary.
#[derive(Debug, Serialize)]
pub struct ResolveSummary {
    /// Quote id.
    pub quote_id: String,
    /// Number of paths resolved.
    pub resolved: usize,
    /// Clock of the resolved record, rendered.
    pub clock: String,
    /// True if the caller must recompute derived totals.
    pub recompute_financials: bool,
    /// Fingerprint of the resolved record.
    pub fingerprint: String,
}

/// Applies a choices file to a merge outcome file written by `merge --out`.
pub fn execute(
    outcome: &Path,
    choices: &Path,
    device: &str,
    out: Option<&Path>,
) -> Result<(Quote, ResolveSummary), Box<dyn std::error::Error>> {
    let MergeOutcome::NeedsResolution { pending, report } = read_json(outcome)? else {
        return Err(CliError::NothingToResolve(outcome.display().to_string()).into());
    };
    let choices: ChoiceMap = read_json(choices)?;

    let engine = MergeEngine::new(MergeConfig::new(device));
    let resolved = engine.resolve(&pending, &report, &choices)?;

    let summary = ResolveSummary {
        quote_id: resolved.quote.id.to_string(),
        resolved: report.len(),
        clock: resolved.quote.clock.to_string(),
        recompute_financials: resolved.recompute_financials,
        fingerprint: fingerprint(&resolved.quote)?.to_string(),
    };

    if let Some(out) = out {
        write_json(out, &resolved.quote)?;
        tracing::info!(path = %out.display(), "wrote resolved quote");
    }

    Ok((resolved.quote, summary))
}

/// Runs the resolve command.
pub fn run(
    outcome: &Path,
    choices: &Path,
    device: &str,
    out: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, summary) = execute(outcome, choices, device, out)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            println!("Quote: {}", summary.quote_id);
            println!("Resolved paths: {}", summary.resolved);
            println!("Clock: {}", summary.clock);
            if summary.recompute_financials {
                println!("Financials must be recomputed.");
            }
            println!("Fingerprint: {}", summary.fingerprint);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotesync_core::{Choice, FieldPath, MergeError, Side};
    use quotesync_testkit::fixtures::{concurrent_critical, FixtureDir, SCENARIO_DEVICE};

    fn conflict_outcome(fixtures: &FixtureDir) -> std::path::PathBuf {
        let s = concurrent_critical();
        let outcome = s.engine().attempt_merge(&s.local, &s.remote).unwrap();
        fixtures.write_json("outcome.json", &outcome)
    }

    #[test]
    fn applies_choices_file() {
        let fixtures = FixtureDir::new();
        let outcome = conflict_outcome(&fixtures);
        let choices = fixtures.file("choices.json");
        std::fs::write(
            &choices,
            r#"{
                "fields.contact_email": "adopt_remote",
                "jobs[J-install].hours": {"override": {"value": 7}}
            }"#,
        )
        .unwrap();
        let out = fixtures.file("resolved.json");

        let (quote, summary) = execute(&outcome, &choices, SCENARIO_DEVICE, Some(&out)).unwrap();
        assert_eq!(summary.resolved, 2);
        assert!(summary.recompute_financials);
        assert_eq!(
            quote.field("contact_email").and_then(|v| v.as_text()),
            Some("manager@harbour.test")
        );
        let job = quote.job(&quotesync_core::JobId::new("J-install")).unwrap();
        assert_eq!(job.param("hours").and_then(|v| v.as_integer()), Some(7));
        let written: Quote = fixtures.read_json("resolved.json");
        assert_eq!(written, quote);
    }

    #[test]
    fn partial_choices_are_rejected() {
        let fixtures = FixtureDir::new();
        let outcome = conflict_outcome(&fixtures);
        let mut choices = ChoiceMap::new();
        choices.insert(FieldPath::scalar("contact_email"), Choice::AdoptLocal);
        let choices = fixtures.write_json("choices.json", &choices);

        let err = execute(&outcome, &choices, SCENARIO_DEVICE, None).unwrap_err();
        let err = err.downcast::<MergeError>().unwrap();
        assert!(matches!(*err, MergeError::IncompleteResolution { .. }));
    }

    #[test]
    fn settled_outcome_has_nothing_to_resolve() {
        let fixtures = FixtureDir::new();
        let outcome = fixtures.write_json("outcome.json", &MergeOutcome::Replace(Side::Local));
        let choices = fixtures.write_json("choices.json", &ChoiceMap::new());

        let err = execute(&outcome, &choices, SCENARIO_DEVICE, None).unwrap_err();
        assert!(err.to_string().contains("nothing to resolve"));
    }
}
