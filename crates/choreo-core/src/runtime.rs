//! Real-time driver.
//!
//! Runs one audit attempt against wall time: the choreographer's virtual
//! clock is advanced as tokio time passes, while the analysis future and
//! session changes are raced with `tokio::select!`. Virtual milliseconds are
//! measured from the moment the attempt begins.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{sleep_until, Instant};

use crate::analysis::{AnalysisOperation, AnalysisResult, AuditRequest};
use crate::choreographer::Choreographer;
use crate::error::Result;
use crate::events::Event;
use crate::session::SessionProvider;

/// Downstream surface that receives the analysis result.
pub trait Navigator {
    /// Called at most once per attempt, after the gate fires.
    fn navigate(&mut self, result: &AnalysisResult);
}

impl<F> Navigator for F
where
    F: FnMut(&AnalysisResult),
{
    fn navigate(&mut self, result: &AnalysisResult) {
        self(result)
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditStatus {
    /// Gate fired and the navigator ran.
    Transitioned { result: AnalysisResult },
    /// Analysis failed; the message is meant for the user.
    Failed { message: String },
    /// Session ended while the attempt was running.
    SignedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditOutcome {
    pub user: String,
    #[serde(flatten)]
    pub status: AuditStatus,
    pub events: Vec<Event>,
    pub completed_at: DateTime<Utc>,
}

/// Run one attempt to its end.
///
/// # Errors
///
/// Fails before anything starts when no user is signed in, the request is
/// invalid, or another attempt is already in flight.
pub async fn drive<O, S, N>(
    choreo: &mut Choreographer,
    request: &AuditRequest,
    operation: &O,
    session: &S,
    navigator: &mut N,
) -> Result<AuditOutcome>
where
    O: AnalysisOperation,
    S: SessionProvider,
    N: Navigator,
{
    let user = session.require_user()?;
    request.validate()?;

    let mut session_rx = session.subscribe();
    session_rx.borrow_and_update();

    let base_ms = choreo.now_ms();
    let origin = Instant::now();
    let virtual_now = move || base_ms + origin.elapsed().as_millis() as u64;

    let mut events = choreo.begin()?;
    tracing::info!(user = %user, "audit attempt started");

    let op = operation.analyze(request);
    tokio::pin!(op);
    let mut op_done = false;

    let status = loop {
        if let Some(result) = events.iter().rev().find_map(|e| match e {
            Event::Transition { result, .. } => Some(result.clone()),
            _ => None,
        }) {
            navigator.navigate(&result);
            break AuditStatus::Transitioned { result };
        }

        let next_due = choreo.next_due_ms();
        let offset = next_due.unwrap_or(base_ms).saturating_sub(base_ms);
        let deadline = origin + Duration::from_millis(offset);

        tokio::select! {
            outcome = &mut op, if !op_done => {
                op_done = true;
                events.extend(choreo.advance_to(virtual_now()));
                let failure = outcome.as_ref().err().map(ToString::to_string);
                events.extend(choreo.report_operation(outcome));
                if let Some(message) = failure {
                    break AuditStatus::Failed { message };
                }
            }
            _ = sleep_until(deadline), if next_due.is_some() => {
                let due = next_due.unwrap_or_default();
                events.extend(choreo.advance_to(virtual_now().max(due)));
            }
            changed = session_rx.changed() => {
                let signed_in = changed.is_ok() && session_rx.borrow().is_some();
                if !signed_in {
                    events.extend(choreo.session_changed(false));
                    break AuditStatus::SignedOut;
                }
            }
        }
    };

    tracing::info!(user = %user, status = status_label(&status), "audit attempt finished");
    Ok(AuditOutcome {
        user,
        status,
        events,
        completed_at: Utc::now(),
    })
}

fn status_label(status: &AuditStatus) -> &'static str {
    match status {
        AuditStatus::Transitioned { .. } => "transitioned",
        AuditStatus::Failed { .. } => "failed",
        AuditStatus::SignedOut => "signed_out",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, OperationError, SessionError, ValidationError};
    use crate::gate::GateState;
    use crate::pattern::{Pacing, PatternSelector, TimingPattern};
    use crate::session::LocalSession;
    use serde_json::{json, Value};
    use std::future::Future;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct ScriptedOperation {
        delay: Duration,
        result: std::result::Result<Value, OperationError>,
    }

    impl AnalysisOperation for ScriptedOperation {
        fn analyze(
            &self,
            _request: &AuditRequest,
        ) -> impl Future<Output = std::result::Result<Value, OperationError>> + Send {
            let delay = self.delay;
            let result = self.result.clone();
            async move {
                tokio::time::sleep(delay).await;
                result
            }
        }
    }

    fn choreographer() -> Choreographer {
        let pacing = Pacing::default();
        let pattern = TimingPattern::new("steady", vec![1.0; 8], vec![4], vec![600]);
        let selector = PatternSelector::new(vec![pattern], &pacing, Some(3)).unwrap();
        Choreographer::with_parts(pacing, 500, selector)
    }

    fn invoice() -> (tempfile::TempDir, AuditRequest) {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("invoice.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        (dir, AuditRequest::new(path))
    }

    #[tokio::test(start_paused = true)]
    async fn transition_fires_after_animation_and_delay() {
        let (_dir, request) = invoice();
        let mut choreo = choreographer();
        let session = LocalSession::signed_in("auditor");
        let op = ScriptedOperation {
            delay: Duration::from_millis(200),
            result: Ok(json!({"status": "safe"})),
        };
        let mut seen = Vec::new();
        let mut navigator = |r: &Value| seen.push(r.clone());

        let start = Instant::now();
        let outcome = drive(&mut choreo, &request, &op, &session, &mut navigator)
            .await
            .unwrap();

        assert_eq!(
            outcome.status,
            AuditStatus::Transitioned {
                result: json!({"status": "safe"})
            }
        );
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, Event::Transition { at_ms: 4_300, .. })));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(4_300) && elapsed < Duration::from_millis(4_400));
        assert_eq!(seen, vec![json!({"status": "safe"})]);
        assert_eq!(choreo.gate_state(), GateState::Fired);
        assert_eq!(choreo.active_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reports_message_and_never_navigates() {
        let (_dir, request) = invoice();
        let mut choreo = choreographer();
        let session = LocalSession::signed_in("auditor");
        let op = ScriptedOperation {
            delay: Duration::from_millis(1_200),
            result: Err(OperationError::Rejected {
                status: 400,
                message: "Invoice could not be parsed".into(),
            }),
        };
        let mut calls = 0;
        let mut navigator = |_: &Value| calls += 1;

        let outcome = drive(&mut choreo, &request, &op, &session, &mut navigator)
            .await
            .unwrap();

        assert_eq!(
            outcome.status,
            AuditStatus::Failed {
                message: "Invoice could not be parsed".into()
            }
        );
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, Event::OperationFailed { at_ms: 1_200, .. })));
        assert_eq!(calls, 0);
        assert_eq!(choreo.active_timer_count(), 0);
        assert_eq!(choreo.last_error(), Some("Invoice could not be parsed"));
        assert!(!choreo.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_tears_down_running_attempt() {
        let (_dir, request) = invoice();
        let mut choreo = choreographer();
        let session = Arc::new(LocalSession::signed_in("auditor"));
        let op = ScriptedOperation {
            delay: Duration::from_secs(60),
            result: Ok(json!({})),
        };

        let signer = Arc::clone(&session);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_000)).await;
            signer.sign_out().unwrap();
        });

        let mut navigator = |_: &Value| {
            unreachable!("navigator must not run after sign-out");
        };
        let outcome = drive(&mut choreo, &request, &op, &*session, &mut navigator)
            .await
            .unwrap();

        assert_eq!(outcome.status, AuditStatus::SignedOut);
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, Event::RunCancelled { .. })));
        assert_eq!(choreo.active_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn preconditions_fail_before_anything_starts() {
        let (_dir, request) = invoice();
        let mut choreo = choreographer();
        let op = ScriptedOperation {
            delay: Duration::ZERO,
            result: Ok(json!({})),
        };
        let mut navigator = |_: &Value| {};

        let err = drive(&mut choreo, &request, &op, &LocalSession::signed_out(), &mut navigator)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Session(SessionError::NotSignedIn)));

        let session = LocalSession::signed_in("auditor");
        let err = drive(&mut choreo, &AuditRequest::default(), &op, &session, &mut navigator)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::MissingInvoice)));
        assert_eq!(choreo.gate_state(), GateState::Idle);
    }
}
