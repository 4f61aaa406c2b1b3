//! Compare command implementation.

use super::read_quote;
use quotesync_core::{compare_clocks, Relationship};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Clock comparison result.
#[derive(Debug, Serialize)]
pub struct CompareResult {
    /// Quote id of the local copy.
    pub quote_id: String,
    /// True if both files hold the same quote.
    pub same_quote: bool,
    /// Relationship of local to remote.
    pub relationship: Relationship,
    /// Local clock, rendered.
    pub local_clock: String,
    /// Remote clock, rendered.
    pub remote_clock: String,
    /// Per-device counters on both sides.
    pub devices: Vec<DeviceCounters>,
}

/// Counters one device holds on each side.
#[derive(Debug, Serialize)]
pub struct DeviceCounters {
    /// Device id.
    pub device: String,
    /// Local counter.
    pub local: u64,
    /// Remote counter.
    pub remote: u64,
}

/// Compares the clocks of two quote files.
pub fn execute(local: &Path, remote: &Path) -> Result<CompareResult, Box<dyn std::error::Error>> {
    let local = read_quote(local)?;
    let remote = read_quote(remote)?;

    let names: BTreeSet<&str> = local.clock.devices().chain(remote.clock.devices()).collect();
    let devices = names
        .into_iter()
        .map(|device| DeviceCounters {
            device: device.to_string(),
            local: local.clock.get(device),
            remote: remote.clock.get(device),
        })
        .collect();

    Ok(CompareResult {
        quote_id: local.id.to_string(),
        same_quote: local.id == remote.id,
        relationship: compare_clocks(&local.clock, &remote.clock),
        local_clock: local.clock.to_string(),
        remote_clock: remote.clock.to_string(),
        devices,
    })
}

/// Runs the compare command.
pub fn run(local: &Path, remote: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = execute(local, remote)?;

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

fn print_text_output(result: &CompareResult) {
    println!("Quote: {}", result.quote_id);
    if !result.same_quote {
        println!("  WARNING: files hold different quotes");
    }
    println!("Local:  {}", result.local_clock);
    println!("Remote: {}", result.remote_clock);
    println!("Relationship: {}", result.relationship);
    println!();
    println!("{:<20} {:>10} {:>10}", "Device", "Local", "Remote");
    for d in &result.devices {
        let marker = if d.local == d.remote { "" } else { "  *" };
        println!("{:<20} {:>10} {:>10}{}", d.device, d.local, d.remote, marker);
    }
}
