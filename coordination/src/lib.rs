//! Incident Coordination Library
//!
//! This library provides the assignment and escalation engine of an ITIL
//! incident desk:
//! - Automatic assignment with SPOC routing and least-loaded balancing
//! - Manual assignment and escalation with role checks
//! - Tiered escalation driven by SLA breach detection
//! - An escalation ledger with per-incident history and statistics
//!
//! # Components
//!
//! ## Assignment
//! - `AssignmentCoordinator`: SPOC-first automatic assignment, manual
//!   assignment, SPOC designation and availability
//! - `TechnicianDirectory`: eligibility by tier, category and role, with
//!   live workload counts
//!
//! ## Escalation
//! - `EscalationEngine`: next-tier, targeted and SLA-driven escalations
//! - `BreachDetector`: periodic sweep over open incidents
//! - `EscalationLedger`: append-only transition history
//!
//! ## Facade
//! - `IncidentEngine`: every operation with structured results, for callers
//!   that should not see `Err` values
//!
//! # Usage
//!
//! ```no_run
//! use incident_coordination::{EngineConfig, EngineContext, IncidentEngine, MemoryStore};
//!
//! # async fn run() -> Result<(), incident_coordination::ConfigError> {
//! let store = MemoryStore::new().shared();
//! let engine = IncidentEngine::new(EngineContext::new(store, EngineConfig::default())?);
//! let escalated = engine.run_automatic_escalation_sweep().await;
//! println!("{}", escalated.message);
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod assignment;
pub mod audit;
pub mod balancer;
pub mod breach;
pub mod clock;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod escalation;
pub mod intake;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod sla;
pub mod store;

#[cfg(test)]
mod testing;

pub use api::{AssignmentResult, EscalationResult, IncidentEngine, OperationResult};
pub use assignment::{Assignment, AssignmentCoordinator, AssignmentRoute};
pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use breach::{BreachDetector, SweepReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CategoryRoute, ConfigError, EngineConfig};
pub use context::EngineContext;
pub use error::{EngineError, EngineResult, OperationError};
pub use escalation::{AutoEscalationOutcome, Escalation, EscalationEngine, EscalationTrigger};
pub use intake::IncidentIntake;
pub use ledger::{EscalationHistoryEntry, EscalationLedger, EscalationStats, TransitionKind};
pub use model::{
    Actor, Impact, Incident, IncidentId, IncidentStatus, NewIncident, Priority, Role, SupportTier,
    Technician, TicketNumber, Urgency, UserId,
};
pub use notify::{
    EventKind, Notification, NotificationDispatcher, Notifier, NotifyError, TracingNotifier,
};
pub use sla::{BreachBasis, BreachKind, SlaTable, SlaTarget};
pub use store::{MemoryStore, SharedStore, Store, StoreError};
