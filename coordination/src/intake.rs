//! Incident intake and workflow status transitions
//!
//! Opening an incident fixes its priority, ticket number and SLA due times,
//! then hands it to automatic assignment. Status moves are checked against
//! the actor and the current status before anything is written.

use tracing::{error, info, warn};

use crate::assignment::{Assignment, AssignmentCoordinator, AssignmentRoute};
use crate::audit::AuditEvent;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::escalation::state::ensure_not_terminal;
use crate::model::{
    Actor, Incident, IncidentId, IncidentStatus, NewIncident, Priority, SupportTier,
    TicketNumber,
};
use crate::sla::due_timestamps;
use crate::store::IncidentStore;

const MAX_TITLE_LEN: usize = 200;

/// Workflow transitions an actor can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    FirstResponse,
    Resolve,
    Close,
    Cancel,
    Reopen,
}

impl StatusChange {
    fn action(self) -> &'static str {
        match self {
            Self::FirstResponse => "incident.first_response",
            Self::Resolve => "incident.resolved",
            Self::Close => "incident.closed",
            Self::Cancel => "incident.cancelled",
            Self::Reopen => "incident.reopened",
        }
    }

    /// Apply the change in memory. Terminal incidents are rejected earlier.
    fn apply(
        self,
        incident: &mut Incident,
        now: chrono::DateTime<chrono::Utc>,
    ) -> EngineResult<()> {
        use IncidentStatus::*;
        match (self, incident.status) {
            (Self::FirstResponse, Open | InProgress) => {
                if incident.first_response_at.is_none() {
                    incident.first_response_at = Some(now);
                }
                incident.status = InProgress;
            }
            (Self::Resolve, Open | InProgress) => {
                incident.first_response_at.get_or_insert(now);
                incident.resolved_at = Some(now);
                incident.status = Resolved;
            }
            (Self::Close, Resolved) => {
                incident.closed_at = Some(now);
                incident.status = Closed;
            }
            (Self::Cancel, _) => {
                incident.closed_at = Some(now);
                incident.status = Cancelled;
            }
            (Self::Reopen, Resolved) => {
                incident.resolved_at = None;
                incident.status = InProgress;
            }
            (change, status) => {
                return Err(EngineError::validation(format!(
                    "cannot apply {:?} to an incident that is {}",
                    change, status
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct IncidentIntake {
    ctx: EngineContext,
    assignment: AssignmentCoordinator,
}

impl IncidentIntake {
    pub fn new(ctx: EngineContext, assignment: AssignmentCoordinator) -> Self {
        Self { ctx, assignment }
    }

    /// Create an incident and run automatic assignment on it.
    ///
    /// The incident is persisted before assignment runs. Losing an assignment
    /// race leaves it unassigned rather than failing the intake; any other
    /// assignment error is returned.
    pub async fn open_incident(
        &self,
        request: NewIncident,
        reporter: &Actor,
    ) -> EngineResult<Assignment> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(EngineError::validation("incident title is required"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(EngineError::validation(format!(
                "incident title exceeds {} characters",
                MAX_TITLE_LEN
            )));
        }
        let category = request.category.trim();
        if category.is_empty() {
            return Err(EngineError::validation("incident category is required"));
        }

        let now = self.ctx.clock.now();
        let priority = request
            .priority
            .unwrap_or_else(|| Priority::from_matrix(request.impact, request.urgency));
        let period = TicketNumber::period_of(now);
        let sequence = self.ctx.store.next_ticket_sequence(&period).await?;
        let (response_due, resolution_due) =
            due_timestamps(self.ctx.config.sla.target_for(priority), now);

        let incident = Incident {
            id: IncidentId(0),
            ticket_number: TicketNumber::format(&period, sequence),
            title: title.to_string(),
            description: request.description,
            category: category.to_string(),
            priority,
            impact: request.impact,
            urgency: request.urgency,
            status: IncidentStatus::Open,
            reporter: reporter.user_id,
            assignee: None,
            assigned_at: None,
            tier: SupportTier::FIRST,
            escalation_count: 0,
            last_escalated_at: None,
            escalation_reason: None,
            auto_escalated: false,
            needs_intervention: false,
            created_at: now,
            first_response_at: None,
            resolved_at: None,
            closed_at: None,
            response_due: Some(response_due),
            resolution_due: Some(resolution_due),
            version: 0,
        };
        let incident = self.ctx.store.insert_incident(incident).await?;

        info!(
            incident = %incident.id,
            ticket = %incident.ticket_number,
            %priority,
            category = %incident.category,
            "Incident opened"
        );
        self.ctx.record(
            AuditEvent::new(
                "incident.opened",
                Some(reporter.user_id),
                format!("{} ({})", incident.ticket_number, priority),
            )
            .on_incident(incident.id),
        );

        match self.assignment.auto_assign(incident.id).await {
            Ok(assignment) => Ok(assignment),
            Err(e) if e.is_retryable() => {
                warn!(
                    incident = %incident.id,
                    "Automatic assignment at intake lost a race: {}", e
                );
                Ok(Assignment {
                    incident,
                    technician: None,
                    route: AssignmentRoute::Unassigned,
                    entry: None,
                })
            }
            Err(e) => {
                error!(
                    incident = %incident.id,
                    "Automatic assignment at intake failed: {}", e
                );
                Err(e)
            }
        }
    }

    pub async fn record_first_response(
        &self,
        id: IncidentId,
        actor: &Actor,
    ) -> EngineResult<Incident> {
        self.change_status(id, StatusChange::FirstResponse, actor).await
    }

    pub async fn resolve(&self, id: IncidentId, actor: &Actor) -> EngineResult<Incident> {
        self.change_status(id, StatusChange::Resolve, actor).await
    }

    pub async fn close(&self, id: IncidentId, actor: &Actor) -> EngineResult<Incident> {
        self.change_status(id, StatusChange::Close, actor).await
    }

    pub async fn cancel(&self, id: IncidentId, actor: &Actor) -> EngineResult<Incident> {
        self.change_status(id, StatusChange::Cancel, actor).await
    }

    pub async fn reopen(&self, id: IncidentId, actor: &Actor) -> EngineResult<Incident> {
        self.change_status(id, StatusChange::Reopen, actor).await
    }

    async fn change_status(
        &self,
        id: IncidentId,
        change: StatusChange,
        actor: &Actor,
    ) -> EngineResult<Incident> {
        let mut incident = self
            .ctx
            .store
            .get_incident(id)
            .await?
            .ok_or(EngineError::IncidentNotFound { id })?;
        ensure_not_terminal(&incident)?;
        authorize_status_change(&incident, change, actor)?;

        let from = incident.status;
        change.apply(&mut incident, self.ctx.clock.now())?;
        let saved = self.ctx.store.save_incident(&incident).await?;

        info!(
            incident = %saved.id,
            from = %from,
            to = %saved.status,
            actor = %actor.user_id,
            "Incident status changed"
        );
        self.ctx.record(
            AuditEvent::new(
                change.action(),
                Some(actor.user_id),
                format!("{} -> {}", from, saved.status),
            )
            .on_incident(saved.id),
        );
        Ok(saved)
    }
}

/// The assignee and supervisors may move an incident; the reporter may also
/// cancel their own incident.
fn authorize_status_change(
    incident: &Incident,
    change: StatusChange,
    actor: &Actor,
) -> EngineResult<()> {
    let is_assignee = incident.assignee == Some(actor.user_id);
    let is_reporter = incident.reporter == actor.user_id;
    let allowed = actor.role.is_privileged()
        || (is_assignee && actor.role.is_assignable())
        || (change == StatusChange::Cancel && is_reporter);
    if allowed {
        Ok(())
    } else {
        Err(EngineError::unauthorized(format!(
            "user {} cannot {:?} incident {}",
            actor.user_id, change, incident.id
        )))
    }
}
