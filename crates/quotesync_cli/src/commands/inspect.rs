//! Inspect command implementation.

use super::{load_classification, read_quote};
use quotesync_core::{fingerprint, FieldValue, Quote};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Quote inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Quote id.
    pub id: String,
    /// Clock, rendered.
    pub clock: String,
    /// Number of devices that edited the quote.
    pub device_count: usize,
    /// Edits recorded across all devices.
    pub total_edits: u64,
    /// Creation time in milliseconds.
    pub created_at: u64,
    /// Last modification time in milliseconds.
    pub modified_at: u64,
    /// Last modifying device.
    pub modified_by: String,
    /// Scalar fields with their classification.
    pub fields: Vec<FieldInfo>,
    /// Jobs in display order.
    pub jobs: Vec<JobInfo>,
    /// Total payable, in minor units.
    pub total: i64,
    /// Canonical fingerprint.
    pub fingerprint: String,
}

/// One scalar field.
#[derive(Debug, Serialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Class, or `unclassified`.
    pub class: String,
    /// True if the field feeds pricing.
    pub affects_cost: bool,
    /// Current value.
    pub value: FieldValue,
}

/// One job.
#[derive(Debug, Serialize)]
pub struct JobInfo {
    /// Job id.
    pub id: String,
    /// Dot of the creating edit.
    pub created: String,
    /// Dot of the last edit.
    pub modified: String,
    /// Parameters.
    pub params: BTreeMap<String, FieldValue>,
    /// Line total.
    pub total: i64,
}

/// Inspects a quote file.
pub fn execute(
    path: &Path,
    classification: Option<&Path>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let quote: Quote = read_quote(path)?;
    let table = load_classification(classification)?;

    let fields = quote
        .fields
        .iter()
        .map(|(name, value)| {
            let rule = table.scalar(name);
            FieldInfo {
                name: name.clone(),
                class: rule.map_or_else(|| "unclassified".to_string(), |r| r.class.to_string()),
                affects_cost: rule.is_some_and(|r| r.affects_cost),
                value: value.clone(),
            }
        })
        .collect();

    let jobs = quote
        .jobs
        .iter()
        .map(|job| JobInfo {
            id: job.id.to_string(),
            created: job.created.to_string(),
            modified: job.modified.to_string(),
            params: job.params.clone(),
            total: job.total,
        })
        .collect();

    Ok(InspectResult {
        id: quote.id.to_string(),
        clock: quote.clock.to_string(),
        device_count: quote.clock.len(),
        total_edits: quote.clock.total_edits(),
        created_at: quote.created_at,
        modified_at: quote.modified_at,
        modified_by: quote.modified_by.clone(),
        fields,
        jobs,
        total: quote.financials.total,
        fingerprint: fingerprint(&quote)?.to_string(),
    })
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    classification: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = execute(path, classification)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Quote: {}", result.id);
    println!("=====================================");
    println!();
    println!("Clock: {}", result.clock);
    println!("  Devices:     {}", result.device_count);
    println!("  Total edits: {}", result.total_edits);
    println!(
        "Modified: {} by {} (created {})",
        result.modified_at, result.modified_by, result.created_at
    );
    println!("Fingerprint: {}", result.fingerprint);

    println!();
    println!("Fields:");
    println!("{:<20} {:<16} {}", "Name", "Class", "Value");
    println!("{:-<20} {:-<16} {:-<20}", "", "", "");
    for f in &result.fields {
        let class = if f.affects_cost {
            format!("{} (cost)", f.class)
        } else {
            f.class.clone()
        };
        println!("{:<20} {:<16} {}", f.name, class, f.value);
    }

    if !result.jobs.is_empty() {
        println!();
        println!("Jobs:");
        for j in &result.jobs {
            println!(
                "  {} created {} modified {} total {}",
                j.id, j.created, j.modified, j.total
            );
            for (name, value) in &j.params {
                println!("    {name} = {value}");
            }
        }
    }

    println!();
    println!("Total: {}", result.total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotesync_core::{ClassificationTable, FieldRule};
    use quotesync_testkit::fixtures::{base_quote, FixtureDir};

    #[test]
    fn inspects_base_quote() {
        let fixtures = FixtureDir::new();
        let path = fixtures.write_json("quote.json", &base_quote());

        let result = execute(&path, None).unwrap();
        assert_eq!(result.id, "Q-1001");
        assert_eq!(result.clock, "{A:2}");
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].created, "A@2");

        let tax = result.fields.iter().find(|f| f.name == "tax_rate").unwrap();
        assert!(tax.affects_cost);
        let notes = result.fields.iter().find(|f| f.name == "notes").unwrap();
        assert!(!notes.affects_cost);
    }

    #[test]
    fn custom_table_marks_gaps() {
        let fixtures = FixtureDir::new();
        let path = fixtures.write_json("quote.json", &base_quote());
        let table = ClassificationTable::builder()
            .scalar("notes", FieldRule::AUTO)
            .build();
        let table_path = fixtures.write_json("table.json", &table);

        let result = execute(&path, Some(&table_path)).unwrap();
        let unclassified = result
            .fields
            .iter()
            .filter(|f| f.class == "unclassified")
            .count();
        assert_eq!(unclassified, result.fields.len() - 1);
    }
}
