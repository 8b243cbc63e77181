//! Incident Engine: caller-facing operations with structured results
//!
//! Every operation returns a result value with a success flag, a message and
//! an optional payload. Engine errors are converted to `OperationError` here
//! and never cross this boundary as `Err`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assignment::{Assignment, AssignmentCoordinator};
use crate::breach::{BreachDetector, SweepReport};
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult, OperationError};
use crate::escalation::{Escalation, EscalationEngine};
use crate::intake::IncidentIntake;
use crate::ledger::{EscalationHistoryEntry, EscalationStats};
use crate::model::{Actor, Incident, IncidentId, NewIncident, SupportTier, Technician, UserId};
use crate::store::{IncidentStore, TechnicianFilter, TechnicianStore};

/// Result of an assignment operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub success: bool,
    pub technician_id: Option<UserId>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl AssignmentResult {
    fn from_result(result: EngineResult<Assignment>) -> Self {
        match result {
            Ok(assignment) => {
                let message = match assignment.technician {
                    Some(tech) => format!(
                        "{} assigned to technician {}",
                        assignment.incident.ticket_number, tech
                    ),
                    None => format!(
                        "no eligible technician for {}; left unassigned",
                        assignment.incident.ticket_number
                    ),
                };
                Self {
                    success: true,
                    technician_id: assignment.technician,
                    message,
                    error: None,
                }
            }
            Err(e) => Self {
                success: false,
                technician_id: None,
                message: e.to_string(),
                error: Some(OperationError::from(&e)),
            },
        }
    }
}

/// Result of a manual escalation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationResult {
    pub success: bool,
    pub from_tier: Option<SupportTier>,
    pub to_tier: Option<SupportTier>,
    pub technician_id: Option<UserId>,
    pub history_entry_id: Option<uuid::Uuid>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl EscalationResult {
    fn from_result(result: EngineResult<Escalation>) -> Self {
        match result {
            Ok(Escalation { incident, entry }) => Self {
                success: true,
                from_tier: Some(entry.from_tier),
                to_tier: Some(entry.to_tier),
                technician_id: incident.assignee,
                history_entry_id: Some(entry.id),
                message: format!(
                    "{} escalated from {} to {}",
                    incident.ticket_number, entry.from_tier, entry.to_tier
                ),
                error: None,
            },
            Err(e) => Self {
                success: false,
                from_tier: None,
                to_tier: None,
                technician_id: None,
                history_entry_id: None,
                message: e.to_string(),
                error: Some(OperationError::from(&e)),
            },
        }
    }
}

/// Generic structured result with an optional payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl<T> OperationResult<T> {
    fn from_result(result: EngineResult<T>, message: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                message: message(&data),
                data: Some(data),
                error: None,
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
                data: None,
                error: Some(OperationError::from(&e)),
            },
        }
    }

    /// Back to a `Result`, for callers that prefer `?`
    pub fn into_result(self) -> Result<T, OperationError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(err)) => Err(err),
            (None, None) => Err(OperationError {
                code: "INTERNAL".to_string(),
                message: self.message,
                retryable: false,
            }),
        }
    }
}

/// Entry point for callers: assignment, escalation, SPOC management,
/// history queries, incident lifecycle and the SLA sweep.
#[derive(Clone)]
pub struct IncidentEngine {
    ctx: EngineContext,
    assignment: AssignmentCoordinator,
    escalation: EscalationEngine,
    intake: IncidentIntake,
    detector: Arc<BreachDetector>,
}

impl IncidentEngine {
    pub fn new(ctx: EngineContext) -> Self {
        let assignment = AssignmentCoordinator::new(ctx.clone());
        let escalation = EscalationEngine::new(ctx.clone());
        let intake = IncidentIntake::new(ctx.clone(), assignment.clone());
        let detector = Arc::new(BreachDetector::new(ctx.clone(), escalation.clone()));
        Self {
            ctx,
            assignment,
            escalation,
            intake,
            detector,
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub async fn open_incident(
        &self,
        request: NewIncident,
        reporter: &Actor,
    ) -> OperationResult<Assignment> {
        OperationResult::from_result(
            self.intake.open_incident(request, reporter).await,
            |a| format!("opened {}", a.incident.ticket_number),
        )
    }

    pub async fn auto_assign(&self, incident: IncidentId) -> AssignmentResult {
        AssignmentResult::from_result(self.assignment.auto_assign(incident).await)
    }

    pub async fn assign_manually(
        &self,
        incident: IncidentId,
        technician: UserId,
        actor: &Actor,
    ) -> AssignmentResult {
        AssignmentResult::from_result(
            self.assignment
                .assign_manually(incident, technician, actor)
                .await,
        )
    }

    pub async fn escalate_to_next_tier(
        &self,
        incident: IncidentId,
        reason: &str,
        destination: Option<UserId>,
        actor: &Actor,
    ) -> EscalationResult {
        EscalationResult::from_result(
            self.escalation
                .escalate_to_next_tier(incident, reason, destination, actor)
                .await,
        )
    }

    /// `target_tier` is taken raw so that 0 or an out-of-range level comes
    /// back as a validation failure rather than a type error.
    pub async fn escalate_to_tier(
        &self,
        incident: IncidentId,
        target_tier: u8,
        reason: &str,
        destination: Option<UserId>,
        actor: &Actor,
    ) -> EscalationResult {
        let result = match SupportTier::new(target_tier) {
            Some(target) => {
                self.escalation
                    .escalate_to_tier(incident, target, reason, destination, actor)
                    .await
            }
            None => Err(EngineError::validation(format!(
                "invalid support tier {}",
                target_tier
            ))),
        };
        EscalationResult::from_result(result)
    }

    /// One sweep over open incidents. Returns how many were escalated.
    pub async fn run_automatic_escalation_sweep(&self) -> OperationResult<usize> {
        OperationResult::from_result(
            self.sweep(&CancellationToken::new())
                .await
                .map(|report| report.escalated),
            |count| format!("{} incident(s) escalated", count),
        )
    }

    /// One sweep with the full report, stopping early if `cancel` fires
    pub async fn sweep(&self, cancel: &CancellationToken) -> EngineResult<SweepReport> {
        self.detector.sweep(cancel).await
    }

    /// Start the periodic sweep at the configured interval
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let period = self.ctx.config.sweep_interval();
        info!(period_secs = period.as_secs(), "Starting SLA sweeper");
        self.detector.clone().spawn_periodic(period, cancel)
    }

    /// Open-incident count per active technician, including zeroes
    pub async fn get_workload_by_technician(&self) -> OperationResult<BTreeMap<UserId, u32>> {
        OperationResult::from_result(self.workloads().await, |w| {
            format!("{} technician(s)", w.len())
        })
    }

    async fn workloads(&self) -> EngineResult<BTreeMap<UserId, u32>> {
        let technicians = self
            .ctx
            .store
            .list_active_technicians(&TechnicianFilter::default())
            .await?;
        let counts = self.ctx.directory.workloads().await?;
        Ok(technicians
            .into_iter()
            .filter(|t| t.is_assignable())
            .map(|t| (t.id, counts.get(&t.id).copied().unwrap_or(0)))
            .collect())
    }

    pub async fn set_spoc(
        &self,
        user: UserId,
        is_spoc: bool,
        actor: &Actor,
    ) -> OperationResult<Technician> {
        OperationResult::from_result(
            self.assignment.set_spoc(user, is_spoc, actor).await,
            |t| format!("user {} SPOC={}", t.id, t.is_spoc),
        )
    }

    pub async fn set_spoc_availability(
        &self,
        user: UserId,
        available: bool,
        actor: &Actor,
    ) -> OperationResult<Technician> {
        OperationResult::from_result(
            self.assignment
                .set_spoc_availability(user, available, actor)
                .await,
            |t| format!("user {} SPOC available={}", t.id, t.spoc_available),
        )
    }

    /// History for one incident, oldest first. Unknown incidents are an error.
    pub async fn get_escalation_history(
        &self,
        incident: IncidentId,
    ) -> OperationResult<Vec<EscalationHistoryEntry>> {
        OperationResult::from_result(self.history(incident).await, |h| {
            format!("{} entries", h.len())
        })
    }

    async fn history(&self, incident: IncidentId) -> EngineResult<Vec<EscalationHistoryEntry>> {
        if self.ctx.store.get_incident(incident).await?.is_none() {
            return Err(EngineError::IncidentNotFound { id: incident });
        }
        self.ctx.ledger.history(incident).await
    }

    pub async fn get_escalation_statistics(&self) -> OperationResult<EscalationStats> {
        OperationResult::from_result(self.ctx.ledger.statistics().await, |s| {
            format!("{} escalation(s)", s.total_escalations)
        })
    }

    pub async fn record_first_response(
        &self,
        incident: IncidentId,
        actor: &Actor,
    ) -> OperationResult<Incident> {
        status_result(self.intake.record_first_response(incident, actor).await)
    }

    pub async fn resolve(&self, incident: IncidentId, actor: &Actor) -> OperationResult<Incident> {
        status_result(self.intake.resolve(incident, actor).await)
    }

    pub async fn close(&self, incident: IncidentId, actor: &Actor) -> OperationResult<Incident> {
        status_result(self.intake.close(incident, actor).await)
    }

    pub async fn cancel(&self, incident: IncidentId, actor: &Actor) -> OperationResult<Incident> {
        status_result(self.intake.cancel(incident, actor).await)
    }

    pub async fn reopen(&self, incident: IncidentId, actor: &Actor) -> OperationResult<Incident> {
        status_result(self.intake.reopen(incident, actor).await)
    }

    /// Re-send notifications that failed earlier
    pub async fn retry_failed_notifications(&self, max_attempts: u32) -> usize {
        let report = self.ctx.notifications.retry_failed(max_attempts).await;
        if report.dropped > 0 {
            warn!(dropped = report.dropped, "Gave up on notifications");
        }
        report.delivered
    }
}

fn status_result(result: EngineResult<Incident>) -> OperationResult<Incident> {
    OperationResult::from_result(result, |i| format!("{} is {}", i.ticket_number, i.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::model::{IncidentStatus, Role};
    use crate::store::{IncidentStore, MemoryStore, SharedStore, TechnicianStore};
    use crate::testing::{incident_fixture, technician_fixture};

    async fn engine() -> (IncidentEngine, SharedStore) {
        let store = MemoryStore::new().shared();
        for (id, tier) in [(1, 1), (2, 2)] {
            store
                .save_technician(&technician_fixture(id, Role::Technician, tier))
                .await
                .unwrap();
        }
        let ctx = EngineContext::new(store.clone(), EngineConfig::default()).unwrap();
        (IncidentEngine::new(ctx), store)
    }

    #[tokio::test]
    async fn test_errors_become_structured_results() {
        let (engine, _store) = engine().await;
        let result = engine.auto_assign(IncidentId(77)).await;
        assert!(!result.success);
        let err = result.error.unwrap();
        assert_eq!(err.code, "NOT_FOUND");
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn test_invalid_target_tier_is_validation() {
        let (engine, store) = engine().await;
        let inc = store.insert_incident(incident_fixture()).await.unwrap();
        let sup = Actor::new(UserId(9), Role::Supervisor);

        let result = engine
            .escalate_to_tier(inc.id, 0, "wrong", None, &sup)
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "VALIDATION");
    }

    #[tokio::test]
    async fn test_escalation_result_carries_tiers_and_entry() {
        let (engine, store) = engine().await;
        let inc = store.insert_incident(incident_fixture()).await.unwrap();
        let tech = Actor::new(UserId(1), Role::Technician);

        let result = engine
            .escalate_to_next_tier(inc.id, "needs network team", None, &tech)
            .await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.from_tier.map(|t| t.level()), Some(1));
        assert_eq!(result.to_tier.map(|t| t.level()), Some(2));
        assert_eq!(result.technician_id, Some(UserId(2)));

        let history = engine.get_escalation_history(inc.id).await;
        let entries = history.into_result().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(Some(entries[0].id), result.history_entry_id);
    }

    #[tokio::test]
    async fn test_workload_map_includes_idle_technicians() {
        let (engine, store) = engine().await;
        let mut busy = incident_fixture();
        busy.assignee = Some(UserId(1));
        busy.status = IncidentStatus::InProgress;
        store.insert_incident(busy).await.unwrap();

        let map = engine
            .get_workload_by_technician()
            .await
            .into_result()
            .unwrap();
        assert_eq!(map.get(&UserId(1)), Some(&1));
        assert_eq!(map.get(&UserId(2)), Some(&0));
    }

    #[tokio::test]
    async fn test_history_of_unknown_incident_fails() {
        let (engine, _store) = engine().await;
        let result = engine.get_escalation_history(IncidentId(5)).await;
        assert!(!result.success);
        assert!(result.data.is_none());
    }
}
