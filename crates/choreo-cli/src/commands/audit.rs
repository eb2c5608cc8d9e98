use std::path::{Path, PathBuf};

use clap::Args;
use choreo_core::{
    drive, AuditRequest, AuditStatus, Choreographer, HttpAnalysisClient, LocalSession,
};

use super::load_config;

#[derive(Args)]
pub struct AuditArgs {
    /// Invoice document (.pdf, .jpg, .jpeg, .png)
    #[arg(long)]
    invoice: Option<PathBuf>,
    /// Purchase order to compare against
    #[arg(long)]
    po: Option<PathBuf>,
    /// Analysis endpoint (overrides analysis.endpoint)
    #[arg(long)]
    endpoint: Option<String>,
    /// Signed-in user (falls back to CHOREO_USER)
    #[arg(long)]
    user: Option<String>,
}

pub fn run(args: AuditArgs, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(path)?;
    if let Some(endpoint) = args.endpoint {
        config.set("analysis.endpoint", &endpoint)?;
    }

    let request = AuditRequest {
        invoice: args.invoice,
        purchase_order: args.po,
    };
    request.validate()?;

    let session = match args.user.or_else(|| std::env::var("CHOREO_USER").ok()) {
        Some(user) => LocalSession::signed_in(user),
        None => LocalSession::signed_out(),
    };

    let client = HttpAnalysisClient::from_config(&config.analysis)?;
    let mut choreo = Choreographer::new(&config)?;
    let mut navigated = None;
    let mut navigator = |result: &serde_json::Value| navigated = Some(result.clone());

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(drive(
        &mut choreo,
        &request,
        &client,
        &session,
        &mut navigator,
    ))?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    match outcome.status {
        AuditStatus::Transitioned { .. } => {
            tracing::debug!(navigated = navigated.is_some(), "audit finished");
            Ok(())
        }
        AuditStatus::Failed { message } => Err(message.into()),
        AuditStatus::SignedOut => Err("session ended during the audit".into()),
    }
}
