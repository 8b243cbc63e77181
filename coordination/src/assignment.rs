//! Assignment Coordinator: automatic and manual technician assignment
//!
//! Automatic assignment routes to an available SPOC first and falls back to
//! the least-loaded eligible technician for the incident's tier. Finding
//! nobody is a valid outcome: the incident stays unassigned.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::audit::AuditEvent;
use crate::balancer::select_least_loaded;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::escalation::state::ensure_not_terminal;
use crate::ledger::{EscalationHistoryEntry, TransitionKind};
use crate::model::{Actor, Incident, IncidentId, Role, Technician, UserId};
use crate::notify::{EventKind, Notification};
use crate::store::{IncidentStore, TechnicianStore};

/// How the assignee was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRoute {
    Spoc,
    LoadBalanced,
    Manual,
    /// No eligible technician; incident left as it was
    Unassigned,
}

impl AssignmentRoute {
    fn reason(self) -> &'static str {
        match self {
            Self::Spoc => "automatic assignment to SPOC",
            Self::LoadBalanced => "automatic assignment to least-loaded technician",
            Self::Manual => "manual assignment",
            Self::Unassigned => "no eligible technician",
        }
    }
}

/// Outcome of an assignment call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub incident: Incident,
    pub technician: Option<UserId>,
    pub route: AssignmentRoute,
    /// Ledger entry, when ownership actually changed
    pub entry: Option<EscalationHistoryEntry>,
}

#[derive(Clone)]
pub struct AssignmentCoordinator {
    ctx: EngineContext,
}

impl AssignmentCoordinator {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Pick an owner for the incident: available SPOC first, otherwise the
    /// least-loaded technician for the category's tier.
    pub async fn auto_assign(&self, incident: IncidentId) -> EngineResult<Assignment> {
        let incident = self.load(incident).await?;
        ensure_not_terminal(&incident)?;

        let (chosen, route) = match self.pick_spoc().await? {
            Some(spoc) => (Some(spoc), AssignmentRoute::Spoc),
            None => {
                let route = self.ctx.config.route_for(&incident.category);
                let tier = incident.tier.max(route.tier);
                let chosen = self.ctx.least_loaded_for(tier, &incident.category).await?;
                (chosen, AssignmentRoute::LoadBalanced)
            }
        };

        let Some(technician) = chosen else {
            warn!(
                incident = %incident.id,
                category = %incident.category,
                "No technician available; incident left unassigned"
            );
            return Ok(Assignment {
                incident,
                technician: None,
                route: AssignmentRoute::Unassigned,
                entry: None,
            });
        };

        if incident.assignee == Some(technician.id) {
            return Ok(Assignment {
                technician: incident.assignee,
                incident,
                route,
                entry: None,
            });
        }

        self.commit(incident, technician, route, None).await
    }

    /// Assign to a named technician. Supervisor or Administrator only.
    pub async fn assign_manually(
        &self,
        incident: IncidentId,
        technician: UserId,
        actor: &Actor,
    ) -> EngineResult<Assignment> {
        if !actor.role.is_privileged() {
            return Err(EngineError::unauthorized(format!(
                "manual assignment requires supervisor or administrator, not {}",
                actor.role
            )));
        }

        let incident = self.load(incident).await?;
        ensure_not_terminal(&incident)?;
        let technician = self.ctx.directory.require_assignable(technician).await?;

        self.commit(
            incident,
            technician,
            AssignmentRoute::Manual,
            Some(actor.user_id),
        )
        .await
    }

    /// Grant or revoke the SPOC flag. Administrator only.
    /// Revoking also clears availability.
    pub async fn set_spoc(
        &self,
        user: UserId,
        is_spoc: bool,
        actor: &Actor,
    ) -> EngineResult<Technician> {
        if actor.role != Role::Administrator {
            return Err(EngineError::unauthorized(format!(
                "only administrators can change SPOC designation, not {}",
                actor.role
            )));
        }

        let mut technician = self.ctx.directory.get(user).await?;
        if is_spoc && !technician.role.is_assignable() {
            return Err(EngineError::validation(format!(
                "user {} has role {} and cannot be a SPOC",
                user, technician.role
            )));
        }

        technician.is_spoc = is_spoc;
        if !is_spoc {
            technician.spoc_available = false;
        }
        self.ctx.store.save_technician(&technician).await?;

        info!(user = %user, is_spoc, "SPOC designation changed");
        self.ctx.record(
            AuditEvent::new("spoc.designation", Some(actor.user_id), format!("is_spoc={}", is_spoc))
                .on_user(user),
        );
        Ok(technician)
    }

    /// Toggle SPOC availability. A SPOC may change their own flag;
    /// administrators may change anyone's.
    pub async fn set_spoc_availability(
        &self,
        user: UserId,
        available: bool,
        actor: &Actor,
    ) -> EngineResult<Technician> {
        if actor.user_id != user && actor.role != Role::Administrator {
            return Err(EngineError::unauthorized(
                "only the SPOC or an administrator can change SPOC availability",
            ));
        }

        let mut technician = self.ctx.directory.get(user).await?;
        if !technician.is_spoc {
            return Err(EngineError::validation(format!(
                "user {} is not a SPOC",
                user
            )));
        }

        technician.spoc_available = available;
        self.ctx.store.save_technician(&technician).await?;

        info!(user = %user, available, "SPOC availability changed");
        self.ctx.record(
            AuditEvent::new(
                "spoc.availability",
                Some(actor.user_id),
                format!("available={}", available),
            )
            .on_user(user),
        );
        Ok(technician)
    }

    /// Least-loaded available SPOC, if any
    async fn pick_spoc(&self) -> EngineResult<Option<Technician>> {
        let spocs = self.ctx.directory.available_spocs().await?;
        if spocs.is_empty() {
            return Ok(None);
        }
        let candidates = self.ctx.directory.candidates(spocs).await?;
        Ok(select_least_loaded(&candidates).map(|c| c.technician.clone()))
    }

    async fn commit(
        &self,
        mut incident: Incident,
        technician: Technician,
        route: AssignmentRoute,
        actor: Option<UserId>,
    ) -> EngineResult<Assignment> {
        let now = self.ctx.clock.now();
        let previous = incident.assignee;
        incident.assign_to(Some(technician.id), now);

        let saved = self.ctx.store.save_incident(&incident).await?;

        let entry = EscalationHistoryEntry::new(
            saved.id,
            TransitionKind::Assignment,
            saved.tier,
            saved.tier,
            previous,
            Some(technician.id),
            route.reason(),
            actor.is_none(),
            actor,
            now,
        );
        self.ctx.ledger.append(&entry).await?;

        info!(
            incident = %saved.id,
            ticket = %saved.ticket_number,
            technician = %technician.id,
            ?route,
            status = %saved.status,
            "Incident assigned"
        );
        self.ctx.record(
            AuditEvent::new(
                "incident.assigned",
                actor,
                format!("{} -> {} ({})", fmt_user(previous), technician.id, route.reason()),
            )
            .on_incident(saved.id)
            .on_user(technician.id),
        );

        self.ctx
            .notifications
            .send(
                Notification::new(technician.id, EventKind::Assigned, saved.id).with_payload(
                    json!({
                        "ticket": saved.ticket_number,
                        "title": saved.title,
                        "priority": saved.priority,
                        "tier": saved.tier.level(),
                    }),
                ),
            )
            .await;

        Ok(Assignment {
            technician: Some(technician.id),
            incident: saved,
            route,
            entry: Some(entry),
        })
    }

    async fn load(&self, id: IncidentId) -> EngineResult<Incident> {
        self.ctx
            .store
            .get_incident(id)
            .await?
            .ok_or(EngineError::IncidentNotFound { id })
    }
}

fn fmt_user(user: Option<UserId>) -> String {
    user.map_or_else(|| "unassigned".to_string(), |u| u.to_string())
}
