//! In-memory store
//!
//! Mirrors the semantics a relational backend would provide: monotonic ids,
//! a per-period ticket sequence, version-checked incident saves and an
//! append-only history table.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{
    HistoryStore, IncidentStore, SharedStore, StoreError, StoreResult, TechnicianFilter,
    TechnicianStore,
};
use crate::ledger::EscalationHistoryEntry;
use crate::model::{Incident, IncidentId, Technician, UserId};

#[derive(Default)]
struct Tables {
    incidents: BTreeMap<IncidentId, Incident>,
    technicians: BTreeMap<UserId, Technician>,
    history: Vec<EscalationHistoryEntry>,
    sequences: HashMap<String, u64>,
    last_incident_id: u64,
}

/// Thread-safe in-memory implementation of every store trait
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn get_incident(&self, id: IncidentId) -> StoreResult<Option<Incident>> {
        Ok(self.read()?.incidents.get(&id).cloned())
    }

    async fn insert_incident(&self, mut incident: Incident) -> StoreResult<Incident> {
        let mut tables = self.write()?;
        tables.last_incident_id += 1;
        incident.id = IncidentId(tables.last_incident_id);
        incident.version = 1;
        tables.incidents.insert(incident.id, incident.clone());
        Ok(incident)
    }

    async fn save_incident(&self, incident: &Incident) -> StoreResult<Incident> {
        let mut tables = self.write()?;
        let stored = tables
            .incidents
            .get_mut(&incident.id)
            .ok_or(StoreError::IncidentNotFound(incident.id))?;

        if stored.version != incident.version {
            return Err(StoreError::VersionConflict {
                id: incident.id,
                expected: incident.version,
                actual: stored.version,
            });
        }

        let mut saved = incident.clone();
        saved.version += 1;
        *stored = saved.clone();
        Ok(saved)
    }

    async fn list_non_terminal_incidents(&self) -> StoreResult<Vec<Incident>> {
        Ok(self
            .read()?
            .incidents
            .values()
            .filter(|i| !i.is_terminal())
            .cloned()
            .collect())
    }

    async fn next_ticket_sequence(&self, period: &str) -> StoreResult<u64> {
        let mut tables = self.write()?;
        let seq = tables.sequences.entry(period.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }
}

#[async_trait]
impl TechnicianStore for MemoryStore {
    async fn list_active_technicians(
        &self,
        filter: &TechnicianFilter,
    ) -> StoreResult<Vec<Technician>> {
        Ok(self
            .read()?
            .technicians
            .values()
            .filter(|t| t.active && !t.deleted && filter.matches(t))
            .cloned()
            .collect())
    }

    async fn get_technician(&self, id: UserId) -> StoreResult<Option<Technician>> {
        Ok(self.read()?.technicians.get(&id).cloned())
    }

    async fn save_technician(&self, technician: &Technician) -> StoreResult<()> {
        self.write()?
            .technicians
            .insert(technician.id, technician.clone());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append_escalation_history(&self, entry: &EscalationHistoryEntry) -> StoreResult<()> {
        self.write()?.history.push(entry.clone());
        Ok(())
    }

    async fn list_escalation_history(
        &self,
        incident: IncidentId,
    ) -> StoreResult<Vec<EscalationHistoryEntry>> {
        Ok(self
            .read()?
            .history
            .iter()
            .filter(|e| e.incident_id == incident)
            .cloned()
            .collect())
    }

    async fn list_all_escalation_history(&self) -> StoreResult<Vec<EscalationHistoryEntry>> {
        Ok(self.read()?.history.clone())
    }
}
