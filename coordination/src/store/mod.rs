//! Persistence interfaces
//!
//! The engine never talks to a database directly. It consumes these
//! repository traits; `MemoryStore` is the in-process implementation used by
//! the sweeper binary and the test suite.
//!
//! Incidents carry a `version` concurrency token. `save_incident` only
//! succeeds when the caller's version matches the stored one, so two writers
//! racing on the same incident cannot both commit.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::ledger::EscalationHistoryEntry;
use crate::model::{Incident, IncidentId, Role, SupportTier, Technician, UserId};

pub use memory::MemoryStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Incident not found: {0}")]
    IncidentNotFound(IncidentId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Version conflict on incident {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: IncidentId,
        expected: u64,
        actual: u64,
    },

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for technician listing. Empty filter matches every active user.
#[derive(Debug, Clone, Default)]
pub struct TechnicianFilter {
    pub role: Option<Role>,
    pub tier: Option<SupportTier>,
    pub spoc_only: bool,
}

impl TechnicianFilter {
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    pub fn spocs() -> Self {
        Self {
            spoc_only: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, tech: &Technician) -> bool {
        self.role.map_or(true, |r| tech.role == r)
            && self.tier.map_or(true, |t| tech.support_tier == Some(t))
            && (!self.spoc_only || tech.is_spoc)
    }
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn get_incident(&self, id: IncidentId) -> StoreResult<Option<Incident>>;

    /// Insert a new incident. The store assigns `id` and the initial version.
    async fn insert_incident(&self, incident: Incident) -> StoreResult<Incident>;

    /// Persist changes, checking `incident.version` against the stored row.
    /// Returns the saved incident with its bumped version.
    async fn save_incident(&self, incident: &Incident) -> StoreResult<Incident>;

    /// Every incident whose status is neither Closed nor Cancelled
    async fn list_non_terminal_incidents(&self) -> StoreResult<Vec<Incident>>;

    /// Next ticket sequence number within a period (starts at 1)
    async fn next_ticket_sequence(&self, period: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait TechnicianStore: Send + Sync {
    /// Active, not soft-deleted users matching the filter
    async fn list_active_technicians(
        &self,
        filter: &TechnicianFilter,
    ) -> StoreResult<Vec<Technician>>;

    async fn get_technician(&self, id: UserId) -> StoreResult<Option<Technician>>;

    async fn save_technician(&self, technician: &Technician) -> StoreResult<()>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_escalation_history(&self, entry: &EscalationHistoryEntry) -> StoreResult<()>;

    /// Entries for one incident, oldest first
    async fn list_escalation_history(
        &self,
        incident: IncidentId,
    ) -> StoreResult<Vec<EscalationHistoryEntry>>;

    /// Every entry, oldest first
    async fn list_all_escalation_history(&self) -> StoreResult<Vec<EscalationHistoryEntry>>;
}

/// Everything the engine needs from persistence
pub trait Store: IncidentStore + TechnicianStore + HistoryStore {}

impl<T: IncidentStore + TechnicianStore + HistoryStore> Store for T {}

/// Shared reference to a Store
pub type SharedStore = Arc<dyn Store>;
