//! SLA targets and breach evaluation
//!
//! Targets are reference data: minutes to first response and minutes to
//! resolution per priority. They are used once at intake to stamp due
//! timestamps. The breach detector works from those stamped due times, so
//! changing the targets later does not move the deadlines of open incidents.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Incident, Priority};

/// Minutes allowed per milestone for one priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaTarget {
    pub first_response_minutes: u32,
    pub resolution_minutes: u32,
}

impl SlaTarget {
    pub const fn new(first_response_minutes: u32, resolution_minutes: u32) -> Self {
        Self {
            first_response_minutes,
            resolution_minutes,
        }
    }

    pub fn first_response(&self) -> Duration {
        Duration::minutes(i64::from(self.first_response_minutes))
    }

    pub fn resolution(&self) -> Duration {
        Duration::minutes(i64::from(self.resolution_minutes))
    }
}

/// SLA targets for every priority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaTable {
    pub critical: SlaTarget,
    pub high: SlaTarget,
    pub medium: SlaTarget,
    pub low: SlaTarget,
}

impl Default for SlaTable {
    fn default() -> Self {
        Self {
            critical: SlaTarget::new(15, 240),
            high: SlaTarget::new(60, 480),
            medium: SlaTarget::new(240, 1440),
            low: SlaTarget::new(480, 2880),
        }
    }
}

impl SlaTable {
    pub fn target_for(&self, priority: Priority) -> SlaTarget {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    pub(crate) fn all(&self) -> [(Priority, SlaTarget); 4] {
        [
            (Priority::Critical, self.critical),
            (Priority::High, self.high),
            (Priority::Medium, self.medium),
            (Priority::Low, self.low),
        ]
    }
}

/// Due timestamps derived once at intake
pub fn due_timestamps(
    target: SlaTarget,
    created_at: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        created_at + target.first_response(),
        created_at + target.resolution(),
    )
}

/// What the elapsed time is measured from when checking for a breach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachBasis {
    /// Each tier gets a full SLA window counted from creation: the deadline
    /// at tier k is the stamped due time plus `(k - 1) × target`
    #[default]
    SinceCreation,
    /// The SLA window restarts at every escalation
    SinceLastEscalation,
}

/// Which milestone was missed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    FirstResponse,
    Resolution,
}

impl BreachKind {
    /// System-generated escalation reason
    pub fn reason(self) -> &'static str {
        match self {
            Self::FirstResponse => "SLA first-response threshold exceeded",
            Self::Resolution => "SLA resolution threshold exceeded",
        }
    }
}

impl std::fmt::Display for BreachKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstResponse => write!(f, "first_response"),
            Self::Resolution => write!(f, "resolution"),
        }
    }
}

/// Deadlines for an incident's current tier under a given basis.
///
/// Under `SinceCreation` the due times stamped at intake anchor tier 1;
/// they are recomputed from `target` only when missing.
pub fn current_deadlines(
    incident: &Incident,
    target: SlaTarget,
    basis: BreachBasis,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match basis {
        BreachBasis::SinceCreation => {
            let (response_due, resolution_due) = due_timestamps(target, incident.created_at);
            let later_windows = i32::from(incident.tier.level()) - 1;
            (
                incident.response_due.unwrap_or(response_due)
                    + target.first_response() * later_windows,
                incident.resolution_due.unwrap_or(resolution_due)
                    + target.resolution() * later_windows,
            )
        }
        BreachBasis::SinceLastEscalation => {
            let from = incident.last_escalated_at.unwrap_or(incident.created_at);
            (from + target.first_response(), from + target.resolution())
        }
    }
}

/// Check whether an incident is past its SLA at `now`.
///
/// A first-response breach takes precedence over a resolution breach.
/// Terminal incidents never breach.
pub fn evaluate_breach(
    incident: &Incident,
    table: &SlaTable,
    basis: BreachBasis,
    now: DateTime<Utc>,
) -> Option<BreachKind> {
    if incident.is_terminal() {
        return None;
    }
    let target = table.target_for(incident.priority);
    let (response_deadline, resolution_deadline) = current_deadlines(incident, target, basis);

    if incident.first_response_at.is_none() && now > response_deadline {
        return Some(BreachKind::FirstResponse);
    }
    if incident.resolved_at.is_none() && now > resolution_deadline {
        return Some(BreachKind::Resolution);
    }
    None
}
