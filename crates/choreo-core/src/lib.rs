//! # Choreo Core Library
//!
//! Progress choreography for long-running audits: a simulated progress run
//! with randomized pacing, joined with the real analysis call so the
//! downstream transition happens once both have finished.
//!
//! ## Architecture
//!
//! - **Clock**: cancellable timers grouped by owner, driven by a virtual
//!   clock that never sleeps
//! - **Patterns**: the catalog of timing patterns and the seeded selector
//! - **Progress**: the tick-driven scheduler and the lifecycle that owns its
//!   timers
//! - **Gate**: two-slot rendezvous between the operation result and the
//!   animation
//! - **Choreographer**: one attempt at a time, with retry after failure
//! - **Runtime**: tokio driver that maps virtual time onto wall time
//!
//! ## Key Components
//!
//! - [`ProgressScheduler`]: progress state machine for one run
//! - [`CompletionGate`]: fires the downstream transition exactly once
//! - [`Choreographer`]: owns the clock, the current run and its gate
//! - [`ChoreoConfig`]: TOML configuration

pub mod analysis;
pub mod choreographer;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod lifecycle;
pub mod pattern;
pub mod progress;
pub mod runtime;
pub mod session;

pub use analysis::{AnalysisOperation, AnalysisResult, AuditRequest, HttpAnalysisClient};
pub use choreographer::Choreographer;
pub use clock::{OwnerId, TimerFired, TimerId, TimerKind, TimerService, VirtualClock};
pub use config::ChoreoConfig;
pub use error::{
    ConfigError, CoreError, OperationError, PatternConfigError, SessionError, ValidationError,
};
pub use events::Event;
pub use gate::{AbortReason, CompletionGate, GateState, ReportOutcome, Signal, SignalSource};
pub use lifecycle::{AnimationLifecycle, CompletionCallback, RunSummary};
pub use pattern::{builtin_catalog, Pacing, PatternSelector, TimingPattern};
pub use progress::{ProgressScheduler, ProgressState, ProgressView, RunPhase};
pub use runtime::{drive, AuditOutcome, AuditStatus, Navigator};
pub use session::{LocalSession, SessionProvider};
