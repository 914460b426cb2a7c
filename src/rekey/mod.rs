//! Master password re-keying.
//!
//! This module provides:
//! - The orchestrator that moves every record to a new master key (`engine`)
//! - Session inputs and the progress/cancellation handle (`session`)
//! - The per-kind outcome (`report`)
//! - Event sinks for progress and auditing (`events`)
//! - Commit scopes around the engine's writes (`transaction`)
//! - The change-master-password workflow over a vault database (`workflow`)

pub mod engine;
pub mod events;
pub mod report;
pub mod session;
pub mod transaction;
pub mod workflow;

pub use engine::{ReKeyEngine, ReKeyOutcome};
pub use events::{EventMessage, EventName, EventSink, Fanout, MemorySink, TracingSink};
pub use report::{KindReport, ReKeyReport};
pub use session::{EngineState, ReKeySession, TaskHandle};
pub use transaction::{CommitGranularity, NoTransaction, Scope, SqliteBoundary, TransactionBoundary};
pub use workflow::change_master_password;
