use std::path::Path;

use clap::Args;
use choreo_core::{Choreographer, OperationError};
use serde_json::json;

use super::load_config;

#[derive(Args)]
pub struct SimulateArgs {
    /// Seed for pattern selection (overrides selection.seed)
    #[arg(long)]
    seed: Option<u64>,
    /// Run this pattern instead of a random pick
    #[arg(long)]
    pattern: Option<String>,
    /// When the analysis result arrives (virtual ms)
    #[arg(long, default_value = "200")]
    operation_ms: u64,
    /// Analysis result payload as JSON
    #[arg(long, default_value = r#"{"status":"safe"}"#)]
    result: String,
    /// Make the analysis fail with this message instead
    #[arg(long)]
    fail: Option<String>,
    /// Cancel the attempt at this time (virtual ms)
    #[arg(long)]
    cancel_at: Option<u64>,
    /// Stop the clock here (virtual ms)
    #[arg(long, default_value = "60000")]
    horizon_ms: u64,
}

pub fn run(args: SimulateArgs, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(path)?;
    if args.seed.is_some() {
        config.selection.seed = args.seed;
    }
    let payload: serde_json::Value = serde_json::from_str(&args.result)?;

    let mut choreo = Choreographer::new(&config)?;
    let mut events = match &args.pattern {
        Some(name) => {
            let pattern = config
                .catalog()
                .into_iter()
                .find(|p| &p.name == name)
                .ok_or_else(|| format!("unknown pattern: {name}"))?;
            choreo.begin_with(pattern, None)?
        }
        None => choreo.begin()?,
    };
    let pattern = choreo.view().map(|v| v.pattern).unwrap_or_default();

    let cancel_first = args.cancel_at.is_some_and(|at| at <= args.operation_ms);
    if let Some(at) = args.cancel_at.filter(|_| cancel_first) {
        events.extend(choreo.advance_to(at));
        events.extend(choreo.cancel());
    } else {
        events.extend(choreo.advance_to(args.operation_ms));
        let outcome = match args.fail {
            Some(message) => Err(OperationError::Rejected {
                status: 500,
                message,
            }),
            None => Ok(payload),
        };
        events.extend(choreo.report_operation(outcome));
        if let Some(at) = args.cancel_at {
            events.extend(choreo.advance_to(at));
            events.extend(choreo.cancel());
        }
    }
    events.extend(choreo.advance_to(args.horizon_ms.max(choreo.now_ms())));

    let out = json!({
        "pattern": pattern,
        "gate_state": choreo.gate_state(),
        "last_error": choreo.last_error(),
        "active_timers": choreo.active_timer_count(),
        "view": choreo.view(),
        "events": events,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
