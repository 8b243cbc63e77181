//! Audit sink
//!
//! "Record event" collaborator. Every committed state change is reported
//! here in addition to the escalation ledger.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{IncidentId, UserId};

/// A committed state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub actor: Option<UserId>,
    pub incident: Option<IncidentId>,
    pub subject: Option<UserId>,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Event stamped with the wall clock. Events recorded through the engine
    /// are restamped with the engine clock.
    pub fn new(
        action: impl Into<String>,
        actor: Option<UserId>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            actor,
            incident: None,
            subject: None,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn on_incident(mut self, incident: IncidentId) -> Self {
        self.incident = Some(incident);
        self
    }

    pub fn on_user(mut self, user: UserId) -> Self {
        self.subject = Some(user);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Shared reference to an AuditSink
pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Writes audit events as tracing events on target `audit`
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            target: "audit",
            action = %event.action,
            actor = ?event.actor,
            incident = ?event.incident,
            subject = ?event.subject,
            "{}",
            event.detail
        );
    }
}

/// Collects audit events in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
