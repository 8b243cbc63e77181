//! Escalation Engine: applies tier transitions to incidents
//!
//! Loads the incident, asks the transition rules in `state` for the
//! destination tier, picks a destination technician, and commits. A commit
//! is one version-checked incident save, one ledger entry, an audit event and
//! best-effort notifications.
//!
//! Escalation is not idempotent: every successful call advances the tier.
//! Two callers racing on the same incident cannot both commit; the loser gets
//! `EngineError::Conflict`.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit::AuditEvent;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::escalation::state::{
    authorize, ensure_not_terminal, plan_target, validate_reason, EscalationTrigger, TierDecision,
};
use crate::ledger::{EscalationHistoryEntry, TransitionKind};
use crate::model::{Actor, Incident, IncidentId, SupportTier, Technician, UserId};
use crate::notify::{EventKind, Notification};
use crate::sla::BreachKind;
use crate::store::IncidentStore;

/// A committed escalation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    /// Incident as saved, with its new version
    pub incident: Incident,
    /// The ledger entry written for this transition
    pub entry: EscalationHistoryEntry,
}

/// Result of an SLA-driven escalation attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AutoEscalationOutcome {
    Escalated(Box<Escalation>),
    /// Already at the highest tier. `newly_flagged` is true the first time,
    /// when supervisors were told manual intervention is needed.
    AtCeiling {
        incident: IncidentId,
        tier: SupportTier,
        newly_flagged: bool,
    },
}

impl AutoEscalationOutcome {
    pub fn escalated(&self) -> bool {
        matches!(self, Self::Escalated(_))
    }
}

/// The Escalation Engine: tier state machine over persisted incidents
#[derive(Clone)]
pub struct EscalationEngine {
    ctx: EngineContext,
}

impl EscalationEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Raise an incident exactly one tier.
    ///
    /// Any assignable role may do this. `destination` bypasses load balancing
    /// but must be an active technician of an assignable role.
    pub async fn escalate_to_next_tier(
        &self,
        incident: IncidentId,
        reason: &str,
        destination: Option<UserId>,
        actor: &Actor,
    ) -> EngineResult<Escalation> {
        self.escalate_manually(
            incident,
            EscalationTrigger::ManualNext,
            reason,
            destination,
            actor,
        )
        .await
    }

    /// Raise an incident to a specific, strictly higher tier.
    /// Supervisor or Administrator only.
    pub async fn escalate_to_tier(
        &self,
        incident: IncidentId,
        target: SupportTier,
        reason: &str,
        destination: Option<UserId>,
        actor: &Actor,
    ) -> EngineResult<Escalation> {
        self.escalate_manually(
            incident,
            EscalationTrigger::ManualTarget { tier: target },
            reason,
            destination,
            actor,
        )
        .await
    }

    /// SLA-driven escalation, called by the breach detector.
    ///
    /// `incident` is the snapshot the breach was evaluated on; if anyone
    /// changed the incident since, the save fails with a conflict. Moves one
    /// tier up with a load-balanced destination. At the ceiling it is a
    /// no-op that flags the incident for manual intervention once.
    pub async fn escalate_automatically(
        &self,
        incident: Incident,
        breach: BreachKind,
    ) -> EngineResult<AutoEscalationOutcome> {
        let trigger = EscalationTrigger::Automatic { breach };
        ensure_not_terminal(&incident)?;

        match plan_target(incident.tier, &trigger, self.ctx.config.max_tier())? {
            TierDecision::AtCeiling => self.flag_ceiling(incident).await,
            TierDecision::Move(target) => {
                let destination = self
                    .ctx
                    .least_loaded_for(target, &incident.category)
                    .await?;
                let escalation = self
                    .commit(
                        incident,
                        trigger,
                        target,
                        destination,
                        breach.reason().to_string(),
                        None,
                    )
                    .await?;
                Ok(AutoEscalationOutcome::Escalated(Box::new(escalation)))
            }
        }
    }

    async fn escalate_manually(
        &self,
        incident: IncidentId,
        trigger: EscalationTrigger,
        reason: &str,
        destination: Option<UserId>,
        actor: &Actor,
    ) -> EngineResult<Escalation> {
        authorize(&trigger, actor)?;
        validate_reason(reason)?;

        let incident = self.load(incident).await?;
        ensure_not_terminal(&incident)?;

        let target = match plan_target(incident.tier, &trigger, self.ctx.config.max_tier())? {
            TierDecision::Move(target) => target,
            TierDecision::AtCeiling => {
                return Err(EngineError::validation(
                    "incident is already at the highest tier",
                ))
            }
        };

        let destination = match destination {
            Some(id) => Some(self.ctx.directory.require_assignable(id).await?),
            None => {
                self.ctx
                    .least_loaded_for(target, &incident.category)
                    .await?
            }
        };

        self.commit(
            incident,
            trigger,
            target,
            destination,
            reason.trim().to_string(),
            Some(actor.user_id),
        )
        .await
    }

    async fn commit(
        &self,
        mut incident: Incident,
        trigger: EscalationTrigger,
        target: SupportTier,
        destination: Option<Technician>,
        reason: String,
        actor: Option<UserId>,
    ) -> EngineResult<Escalation> {
        let now = self.ctx.clock.now();
        let from_tier = incident.tier;
        let from_technician = incident.assignee;
        let to_technician = destination.as_ref().map(|t| t.id);

        incident.tier = target;
        incident.escalation_count += 1;
        incident.last_escalated_at = Some(now);
        incident.escalation_reason = Some(reason.clone());
        incident.auto_escalated = trigger.is_automatic();
        incident.assign_to(to_technician, now);

        let saved = self.ctx.store.save_incident(&incident).await?;

        let entry = EscalationHistoryEntry::new(
            saved.id,
            TransitionKind::Escalation,
            from_tier,
            target,
            from_technician,
            to_technician,
            reason,
            trigger.is_automatic(),
            actor,
            now,
        );
        self.ctx.ledger.append(&entry).await?;

        info!(
            incident = %saved.id,
            ticket = %saved.ticket_number,
            from = %from_tier,
            to = %target,
            technician = ?to_technician,
            trigger = %trigger,
            "Incident escalated"
        );
        if to_technician.is_none() {
            warn!(
                incident = %saved.id,
                tier = %target,
                "Escalated without an eligible technician; incident left unassigned"
            );
        }

        self.ctx.record(
            AuditEvent::new(
                "incident.escalated",
                actor,
                format!("{} -> {} ({}): {}", from_tier, target, trigger, entry.reason),
            )
            .on_incident(saved.id),
        );

        self.notify_escalation(&saved, &entry).await;

        Ok(Escalation {
            incident: saved,
            entry,
        })
    }

    async fn flag_ceiling(&self, mut incident: Incident) -> EngineResult<AutoEscalationOutcome> {
        let id = incident.id;
        let tier = incident.tier;

        if incident.needs_intervention {
            debug!(incident = %id, %tier, "Already flagged at ceiling");
            return Ok(AutoEscalationOutcome::AtCeiling {
                incident: id,
                tier,
                newly_flagged: false,
            });
        }

        incident.needs_intervention = true;
        let saved = self.ctx.store.save_incident(&incident).await?;
        warn!(
            incident = %id,
            ticket = %saved.ticket_number,
            %tier,
            "SLA breached at the highest tier; manual intervention needed"
        );
        self.ctx.record(
            AuditEvent::new(
                "incident.needs_intervention",
                None,
                format!("SLA breached at {}", tier),
            )
            .on_incident(id),
        );

        let payload = json!({ "ticket": saved.ticket_number, "tier": tier.level() });
        let alerts = self
            .supervisor_ids()
            .await
            .into_iter()
            .map(|sup| {
                Notification::new(sup, EventKind::NeedsIntervention, id)
                    .with_payload(payload.clone())
            });
        self.ctx.notifications.send_all(alerts).await;

        Ok(AutoEscalationOutcome::AtCeiling {
            incident: id,
            tier,
            newly_flagged: true,
        })
    }

    async fn notify_escalation(&self, incident: &Incident, entry: &EscalationHistoryEntry) {
        let payload = json!({
            "ticket": incident.ticket_number,
            "from_tier": entry.from_tier.level(),
            "to_tier": entry.to_tier.level(),
            "reason": entry.reason,
            "automatic": entry.automatic,
        });

        let mut notes = Vec::new();
        if let Some(to) = entry.to_technician {
            notes.push(
                Notification::new(to, EventKind::Escalated, incident.id)
                    .with_payload(payload.clone()),
            );
        }
        if entry.to_technician.is_none() {
            notes.extend(self.orphan_notices(incident, entry, &payload).await);
        }
        if entry.automatic {
            notes.extend(
                self.supervisor_ids()
                    .await
                    .into_iter()
                    .filter(|sup| Some(*sup) != entry.to_technician)
                    .map(|sup| {
                        Notification::new(sup, EventKind::AutoEscalationAlert, incident.id)
                            .with_payload(payload.clone())
                    }),
            );
        }
        self.ctx.notifications.send_all(notes).await;
    }

    /// Tell the previous owner the incident left them with no successor.
    /// Supervisors are told too unless the automatic alert already covers it.
    async fn orphan_notices(
        &self,
        incident: &Incident,
        entry: &EscalationHistoryEntry,
        payload: &serde_json::Value,
    ) -> Vec<Notification> {
        let mut recipients: Vec<UserId> = entry.from_technician.into_iter().collect();
        if !entry.automatic {
            for sup in self.supervisor_ids().await {
                if !recipients.contains(&sup) {
                    recipients.push(sup);
                }
            }
        }
        recipients
            .into_iter()
            .map(|user| {
                Notification::new(user, EventKind::Unassigned, incident.id)
                    .with_payload(payload.clone())
            })
            .collect()
    }

    /// Supervisors to alert. A lookup failure only costs the alerts.
    async fn supervisor_ids(&self) -> Vec<UserId> {
        match self.ctx.directory.supervisors().await {
            Ok(sups) => sups.into_iter().map(|s| s.id).collect(),
            Err(e) => {
                warn!("Could not list supervisors for alerts: {}", e);
                Vec::new()
            }
        }
    }

    async fn load(&self, id: IncidentId) -> EngineResult<Incident> {
        self.ctx
            .store
            .get_incident(id)
            .await?
            .ok_or(EngineError::IncidentNotFound { id })
    }
}
