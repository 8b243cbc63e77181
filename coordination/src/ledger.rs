//! Escalation history ledger
//!
//! Append-only record of every assignment and escalation transition. Entries
//! are immutable once written: the ledger exposes no update or delete.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::model::{IncidentId, SupportTier, UserId};
use crate::store::{HistoryStore, SharedStore};

/// What kind of transition an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Ownership changed within the same tier
    Assignment,
    /// Tier increased
    Escalation,
}

/// One immutable row of the escalation trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationHistoryEntry {
    /// Unique entry id, usable as an idempotency key by callers
    pub id: Uuid,
    pub incident_id: IncidentId,
    pub kind: TransitionKind,
    pub from_tier: SupportTier,
    pub to_tier: SupportTier,
    pub from_technician: Option<UserId>,
    pub to_technician: Option<UserId>,
    pub reason: String,
    pub automatic: bool,
    /// Who triggered the transition (`None` for the SLA sweep)
    pub actor: Option<UserId>,
    pub timestamp: DateTime<Utc>,
}

impl EscalationHistoryEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        incident_id: IncidentId,
        kind: TransitionKind,
        from_tier: SupportTier,
        to_tier: SupportTier,
        from_technician: Option<UserId>,
        to_technician: Option<UserId>,
        reason: impl Into<String>,
        automatic: bool,
        actor: Option<UserId>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            kind,
            from_tier,
            to_tier,
            from_technician,
            to_technician,
            reason: reason.into(),
            automatic,
            actor,
            timestamp,
        }
    }

    pub fn is_escalation(&self) -> bool {
        self.kind == TransitionKind::Escalation
    }
}

/// Aggregate escalation statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationStats {
    pub total_escalations: usize,
    pub automatic_escalations: usize,
    pub manual_escalations: usize,
    /// Destination tier level → escalation count
    pub by_destination_tier: BTreeMap<u8, usize>,
    /// Distinct incidents that were escalated at least once
    pub incidents_escalated: usize,
    pub total_assignments: usize,
    pub mean_escalations_per_incident: f64,
}

impl EscalationStats {
    pub fn from_entries(entries: &[EscalationHistoryEntry]) -> Self {
        let mut stats = Self::default();
        let mut incidents = HashSet::new();

        for entry in entries {
            match entry.kind {
                TransitionKind::Assignment => stats.total_assignments += 1,
                TransitionKind::Escalation => {
                    stats.total_escalations += 1;
                    if entry.automatic {
                        stats.automatic_escalations += 1;
                    } else {
                        stats.manual_escalations += 1;
                    }
                    *stats
                        .by_destination_tier
                        .entry(entry.to_tier.level())
                        .or_insert(0) += 1;
                    incidents.insert(entry.incident_id);
                }
            }
        }

        stats.incidents_escalated = incidents.len();
        if stats.incidents_escalated > 0 {
            stats.mean_escalations_per_incident =
                stats.total_escalations as f64 / stats.incidents_escalated as f64;
        }
        stats
    }
}

/// Read/append access to the history trail
#[derive(Clone)]
pub struct EscalationLedger {
    store: SharedStore,
}

impl EscalationLedger {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn append(&self, entry: &EscalationHistoryEntry) -> EngineResult<()> {
        self.store.append_escalation_history(entry).await?;
        debug!(
            incident = %entry.incident_id,
            entry = %entry.id,
            from = %entry.from_tier,
            to = %entry.to_tier,
            automatic = entry.automatic,
            "History entry appended"
        );
        Ok(())
    }

    pub async fn history(&self, incident: IncidentId) -> EngineResult<Vec<EscalationHistoryEntry>> {
        Ok(self.store.list_escalation_history(incident).await?)
    }

    pub async fn statistics(&self) -> EngineResult<EscalationStats> {
        let entries = self.store.list_all_escalation_history().await?;
        Ok(EscalationStats::from_entries(&entries))
    }
}
