//! Incident record and its classification enums

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::{IncidentId, SupportTier, UserId};

/// Business priority of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// ITIL priority matrix over impact × urgency
    pub fn from_matrix(impact: Impact, urgency: Urgency) -> Self {
        use Impact as I;
        use Urgency as U;
        match (impact, urgency) {
            (I::High, U::High) => Self::Critical,
            (I::High, U::Medium) | (I::Medium, U::High) => Self::High,
            (I::High, U::Low) | (I::Low, U::High) | (I::Medium, U::Medium) => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// How much of the business an incident affects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// How quickly the business needs the incident handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// Workflow status. Orthogonal to the support tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
    Cancelled,
}

impl IncidentStatus {
    /// Closed and Cancelled incidents accept no further assignment or escalation
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Resolved => write!(f, "resolved"),
            Self::Closed => write!(f, "closed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Human-readable ticket number, `INC-YYYYMM-NNNNN`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketNumber(pub String);

impl TicketNumber {
    /// Sequence period key for a timestamp (`YYYYMM`)
    pub fn period_of(at: DateTime<Utc>) -> String {
        format!("{:04}{:02}", at.year(), at.month())
    }

    pub fn format(period: &str, sequence: u64) -> Self {
        Self(format!("INC-{}-{:05}", period, sequence))
    }
}

impl std::fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Input for opening a new incident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIncident {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub impact: Impact,
    pub urgency: Urgency,
    /// Explicit priority; derived from the matrix when absent
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// An incident ticket with its assignment and escalation bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub ticket_number: TicketNumber,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub impact: Impact,
    pub urgency: Urgency,
    pub status: IncidentStatus,

    /// Owner of record, never changes
    pub reporter: UserId,
    pub assignee: Option<UserId>,
    pub assigned_at: Option<DateTime<Utc>>,

    pub tier: SupportTier,
    #[serde(default)]
    pub escalation_count: u32,
    pub last_escalated_at: Option<DateTime<Utc>>,
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub auto_escalated: bool,
    /// Set once automatic escalation hits the tier ceiling
    #[serde(default)]
    pub needs_intervention: bool,

    pub created_at: DateTime<Utc>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub response_due: Option<DateTime<Utc>>,
    pub resolution_due: Option<DateTime<Utc>>,

    /// Concurrency token, bumped by the store on every save
    #[serde(default)]
    pub version: u64,
}

impl Incident {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record a new owner. An Open incident moves to InProgress on assignment.
    pub fn assign_to(&mut self, technician: Option<UserId>, at: DateTime<Utc>) {
        self.assignee = technician;
        self.assigned_at = technician.map(|_| at);
        if technician.is_some() && self.status == IncidentStatus::Open {
            self.status = IncidentStatus::InProgress;
        }
    }
}
