//! Escalation State: tier transition rules
//!
//! Pure functions deciding where an incident may move. No I/O here; the
//! engine loads the incident, asks these rules for a target tier, then
//! commits.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::model::{Actor, Incident, SupportTier};
use crate::sla::BreachKind;

/// What started an escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscalationTrigger {
    /// SLA breach detected by the sweep
    Automatic { breach: BreachKind },
    /// Actor raised the incident one tier
    ManualNext,
    /// Supervisor/administrator raised the incident to a chosen tier
    ManualTarget { tier: SupportTier },
}

impl EscalationTrigger {
    pub fn is_automatic(&self) -> bool {
        matches!(self, Self::Automatic { .. })
    }
}

impl std::fmt::Display for EscalationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Automatic { breach } => write!(f, "automatic ({} breach)", breach),
            Self::ManualNext => write!(f, "manual (next tier)"),
            Self::ManualTarget { tier } => write!(f, "manual (to {})", tier),
        }
    }
}

/// Where a transition would land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierDecision {
    /// Move to this tier
    Move(SupportTier),
    /// Automatic escalation at the ceiling; nothing to do
    AtCeiling,
}

/// Authorization for a manual trigger. Checked before any state is read.
pub fn authorize(trigger: &EscalationTrigger, actor: &Actor) -> EngineResult<()> {
    match trigger {
        EscalationTrigger::Automatic { .. } => Ok(()),
        EscalationTrigger::ManualNext if actor.role.is_assignable() => Ok(()),
        EscalationTrigger::ManualNext => Err(EngineError::unauthorized(format!(
            "role {} cannot escalate incidents",
            actor.role
        ))),
        EscalationTrigger::ManualTarget { .. } if actor.role.is_privileged() => Ok(()),
        EscalationTrigger::ManualTarget { .. } => Err(EngineError::unauthorized(format!(
            "escalating to a specific tier requires supervisor or administrator, not {}",
            actor.role
        ))),
    }
}

/// Manual escalations need a non-blank reason
pub fn validate_reason(reason: &str) -> EngineResult<()> {
    if reason.trim().is_empty() {
        return Err(EngineError::validation("escalation reason is required"));
    }
    Ok(())
}

/// Reject any transition on a Closed or Cancelled incident
pub fn ensure_not_terminal(incident: &Incident) -> EngineResult<()> {
    if incident.is_terminal() {
        return Err(EngineError::Terminal {
            id: incident.id,
            status: incident.status.to_string(),
        });
    }
    Ok(())
}

/// Compute the destination tier for a trigger.
///
/// Automatic and next-tier escalations move exactly one tier. A targeted
/// escalation must go strictly upward; it is never a de-escalation.
pub fn plan_target(
    current: SupportTier,
    trigger: &EscalationTrigger,
    max_tier: SupportTier,
) -> EngineResult<TierDecision> {
    match trigger {
        EscalationTrigger::Automatic { .. } => {
            if current >= max_tier {
                Ok(TierDecision::AtCeiling)
            } else {
                Ok(TierDecision::Move(current.next()))
            }
        }
        EscalationTrigger::ManualNext => {
            if current >= max_tier {
                return Err(EngineError::validation(format!(
                    "incident is already at the highest tier ({})",
                    max_tier
                )));
            }
            Ok(TierDecision::Move(current.next()))
        }
        EscalationTrigger::ManualTarget { tier } => {
            if *tier <= current {
                return Err(EngineError::validation(format!(
                    "target {} must be above current {}",
                    tier, current
                )));
            }
            if *tier > max_tier {
                return Err(EngineError::validation(format!(
                    "target {} exceeds the highest tier ({})",
                    tier, max_tier
                )));
            }
            Ok(TierDecision::Move(*tier))
        }
    }
}
