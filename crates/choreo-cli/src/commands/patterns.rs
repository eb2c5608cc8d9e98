use std::path::Path;

use clap::Subcommand;
use serde_json::json;

use super::load_config;

#[derive(Subcommand)]
pub enum PatternsAction {
    /// List the active catalog
    List,
    /// Print one pattern with its progress curve
    Show {
        /// Pattern name
        name: String,
    },
    /// Validate every pattern against the configured pacing
    Check,
}

pub fn run(action: PatternsAction, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let pacing = &config.pacing;
    let catalog = config.catalog();

    match action {
        PatternsAction::List => {
            let rows: Vec<_> = catalog
                .iter()
                .enumerate()
                .map(|(index, p)| {
                    json!({
                        "index": index,
                        "name": p.name,
                        "speeds": p.speeds,
                        "pause_points": p.pause_points,
                        "pause_durations_ms": p.pause_durations_ms,
                        "steps_to_complete": p.steps_to_complete(pacing),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        PatternsAction::Show { name } => {
            let pattern = catalog
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| format!("unknown pattern: {name}"))?;
            let out = json!({
                "pattern": pattern,
                "steps_to_complete": pattern.steps_to_complete(pacing),
                "curve": pattern.curve(pacing),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        PatternsAction::Check => {
            for pattern in &catalog {
                pattern.validate(pacing)?;
            }
            println!("ok: {} patterns", catalog.len());
        }
    }
    Ok(())
}
