//! Notification fan-out
//!
//! The delivery channel (email, SMS, push) is an external collaborator behind
//! the `Notifier` trait. Delivery is best-effort: a failed send never rolls
//! back the assignment or escalation that caused it. Failures are kept by the
//! dispatcher as `FailedDelivery` entries and can be retried later.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::model::{IncidentId, UserId};

/// Error type for the notification channel
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Recipient unreachable: {0}")]
    Unreachable(UserId),
}

/// What happened to the incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Recipient became the incident's assignee
    Assigned,
    /// Recipient received an escalated incident
    Escalated,
    /// Supervisor notice of an SLA-driven escalation
    AutoEscalationAlert,
    /// Automatic escalation hit the tier ceiling
    NeedsIntervention,
    /// Escalation found nobody eligible at the new tier; the incident has
    /// no owner
    Unassigned,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assigned => write!(f, "assigned"),
            Self::Escalated => write!(f, "escalated"),
            Self::AutoEscalationAlert => write!(f, "auto_escalation_alert"),
            Self::NeedsIntervention => write!(f, "needs_intervention"),
            Self::Unassigned => write!(f, "unassigned"),
        }
    }
}

/// "Notify user X about event Y on incident Z"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub event: EventKind,
    pub incident: IncidentId,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn new(recipient: UserId, event: EventKind, incident: IncidentId) -> Self {
        Self {
            recipient,
            event,
            incident,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Delivery channel collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Shared reference to a Notifier
pub type SharedNotifier = Arc<dyn Notifier>;

/// Notifier that only writes a log line
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            event = %notification.event,
            incident = %notification.incident,
            "Notification"
        );
        Ok(())
    }
}

/// A send that failed and is waiting for retry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub notification: Notification,
    pub attempts: u32,
    pub last_error: String,
    pub last_attempt_at: DateTime<Utc>,
}

/// Outcome of a retry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryReport {
    pub delivered: usize,
    /// Entries dropped after exhausting their attempts
    pub dropped: usize,
    pub pending: usize,
}

/// Sends notifications and keeps the failed-delivery log
pub struct NotificationDispatcher {
    notifier: SharedNotifier,
    clock: SharedClock,
    failed: Mutex<Vec<FailedDelivery>>,
}

impl NotificationDispatcher {
    pub fn new(notifier: SharedNotifier, clock: SharedClock) -> Self {
        Self {
            notifier,
            clock,
            failed: Mutex::new(Vec::new()),
        }
    }

    /// Send one notification. Never fails; failures are logged and recorded.
    pub async fn send(&self, notification: Notification) {
        match self.notifier.notify(&notification).await {
            Ok(()) => debug!(
                recipient = %notification.recipient,
                event = %notification.event,
                "Notification delivered"
            ),
            Err(e) => {
                warn!(
                    recipient = %notification.recipient,
                    event = %notification.event,
                    incident = %notification.incident,
                    "Notification failed: {}",
                    e
                );
                self.record_failure(notification, 1, &e);
            }
        }
    }

    pub async fn send_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            self.send(notification).await;
        }
    }

    /// Snapshot of deliveries waiting for retry
    pub fn pending_failures(&self) -> Vec<FailedDelivery> {
        self.lock_failed().clone()
    }

    /// Re-send every failed delivery once. Entries that fail again and have
    /// reached `max_attempts` are dropped.
    pub async fn retry_failed(&self, max_attempts: u32) -> RetryReport {
        let queued = std::mem::take(&mut *self.lock_failed());
        let mut report = RetryReport::default();

        for entry in queued {
            match self.notifier.notify(&entry.notification).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    let attempts = entry.attempts + 1;
                    if attempts >= max_attempts {
                        warn!(
                            recipient = %entry.notification.recipient,
                            attempts,
                            "Dropping notification after repeated failures: {}",
                            e
                        );
                        report.dropped += 1;
                    } else {
                        self.record_failure(entry.notification, attempts, &e);
                        report.pending += 1;
                    }
                }
            }
        }
        report
    }

    fn record_failure(&self, notification: Notification, attempts: u32, error: &NotifyError) {
        self.lock_failed().push(FailedDelivery {
            notification,
            attempts,
            last_error: error.to_string(),
            last_attempt_at: self.clock.now(),
        });
    }

    fn lock_failed(&self) -> std::sync::MutexGuard<'_, Vec<FailedDelivery>> {
        self.failed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::fixed_time;

    fn note() -> Notification {
        Notification::new(UserId(5), EventKind::Assigned, IncidentId(1))
    }

    fn dispatcher(mock: MockNotifier) -> NotificationDispatcher {
        NotificationDispatcher::new(Arc::new(mock), Arc::new(ManualClock::new(fixed_time())))
    }

    #[tokio::test]
    async fn test_failed_send_is_recorded_not_raised() {
        let mut mock = MockNotifier::new();
        mock.expect_notify()
            .times(1)
            .returning(|_| Err(NotifyError::DeliveryFailed("smtp down".into())));
        let dispatcher = dispatcher(mock);

        dispatcher.send(note()).await;

        let pending = dispatcher.pending_failures();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0].last_error.contains("smtp down"));
        assert_eq!(pending[0].last_attempt_at, fixed_time());
    }

    #[tokio::test]
    async fn test_retry_delivers_and_clears() {
        let mut mock = MockNotifier::new();
        let mut calls = 0;
        mock.expect_notify().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(NotifyError::Unreachable(UserId(5)))
            } else {
                Ok(())
            }
        });
        let dispatcher = dispatcher(mock);

        dispatcher.send(note()).await;
        let report = dispatcher.retry_failed(3).await;

        assert_eq!(report.delivered, 1);
        assert!(dispatcher.pending_failures().is_empty());
    }

    #[tokio::test]
    async fn test_retry_drops_after_max_attempts() {
        let mut mock = MockNotifier::new();
        mock.expect_notify()
            .returning(|_| Err(NotifyError::DeliveryFailed("bounce".into())));
        let dispatcher = dispatcher(mock);

        dispatcher.send(note()).await;
        let first = dispatcher.retry_failed(3).await;
        assert_eq!(first.pending, 1);
        assert_eq!(dispatcher.pending_failures()[0].attempts, 2);

        let second = dispatcher.retry_failed(3).await;
        assert_eq!(second.dropped, 1);
        assert!(dispatcher.pending_failures().is_empty());
    }
}
