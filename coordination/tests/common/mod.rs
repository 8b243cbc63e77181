//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident_coordination::store::TechnicianStore;
use incident_coordination::{
    EngineConfig, EngineContext, EventKind, Impact, IncidentEngine, ManualClock,
    MemoryAuditSink, MemoryStore, NewIncident, Notification, Notifier, NotifyError, Role,
    SharedStore, SupportTier, Technician, Urgency, UserId,
};

pub fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-09T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn technician(id: u64, role: Role, tier: Option<u8>) -> Technician {
    Technician {
        id: UserId(id),
        name: format!("tech-{}", id),
        email: format!("tech-{}@example.test", id),
        role,
        support_tier: tier.and_then(SupportTier::new),
        is_spoc: false,
        spoc_available: false,
        active: true,
        deleted: false,
    }
}

pub fn request(title: &str, impact: Impact, urgency: Urgency) -> NewIncident {
    NewIncident {
        title: title.to_string(),
        description: String::new(),
        category: "Hardware".to_string(),
        impact,
        urgency,
        priority: None,
    }
}

/// Notifier that keeps every notification it was handed
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, recipient: UserId, event: EventKind) -> usize {
        self.sent()
            .iter()
            .filter(|n| n.recipient == recipient && n.event == event)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Engine over an in-memory store, a manual clock and recording sinks
pub struct Harness {
    pub engine: IncidentEngine,
    pub store: SharedStore,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub audit: Arc<MemoryAuditSink>,
}

impl Harness {
    pub async fn new(technicians: Vec<Technician>) -> Self {
        Self::with_config(technicians, EngineConfig::default()).await
    }

    pub async fn with_config(technicians: Vec<Technician>, config: EngineConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("incident_coordination=debug")
            .with_test_writer()
            .try_init();

        let store = MemoryStore::new().shared();
        for t in &technicians {
            store.save_technician(t).await.unwrap();
        }
        let clock = Arc::new(ManualClock::new(start_time()));
        let notifier = Arc::new(RecordingNotifier::default());
        let audit = Arc::new(MemoryAuditSink::new());
        let ctx = EngineContext::builder(store.clone(), config)
            .clock(clock.clone())
            .notifier(notifier.clone())
            .audit(audit.clone())
            .build()
            .unwrap();
        Self {
            engine: IncidentEngine::new(ctx),
            store,
            clock,
            notifier,
            audit,
        }
    }

    pub fn minutes(&self, minutes: i64) {
        self.clock.set(start_time() + chrono::Duration::minutes(minutes));
    }
}

/// Technicians 1..=3 on tiers 1..=3 and supervisor 9 without a tier
pub fn tiered_staff() -> Vec<Technician> {
    vec![
        technician(1, Role::Technician, Some(1)),
        technician(2, Role::Technician, Some(2)),
        technician(3, Role::Technician, Some(3)),
        technician(9, Role::Supervisor, None),
    ]
}
