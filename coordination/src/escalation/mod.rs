//! Escalation: tiered support state machine
//!
//! An incident's tier is independent of its workflow status: an incident can
//! sit at tier 2 while InProgress. Tiers only go up.
//!
//! # Transitions
//!
//! ```text
//! tier 1 (front-line)
//!     │
//!     ├─ SLA breach (sweep)          → tier + 1, load-balanced destination
//!     ├─ manual "next tier" (any support role, reason required)
//!     ├─ manual "to tier N" (supervisor/administrator, N > current)
//!     ▼
//! tier 2 (specialist)
//!     │
//!     ▼
//! tier max (vendor)
//!     │
//!     └─ SLA breach at the ceiling   → no-op, flagged for manual intervention
//!
//! Closed / Cancelled                 → every transition rejected
//! ```

pub mod engine;
pub mod state;

pub use engine::{AutoEscalationOutcome, Escalation, EscalationEngine};
pub use state::{EscalationTrigger, TierDecision};
