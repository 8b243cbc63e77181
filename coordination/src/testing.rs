//! Shared unit-test fixtures

use chrono::{DateTime, Utc};

use crate::model::{
    Impact, Incident, IncidentId, IncidentStatus, Priority, Role, SupportTier, Technician,
    TicketNumber, Urgency, UserId,
};

pub(crate) fn fixed_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-09T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Open, unassigned, medium-priority hardware incident at tier 1
pub(crate) fn incident_fixture() -> Incident {
    Incident {
        id: IncidentId(0),
        ticket_number: TicketNumber::format("202603", 0),
        title: "Laptop will not boot".into(),
        description: String::new(),
        category: "Hardware".into(),
        priority: Priority::Medium,
        impact: Impact::Medium,
        urgency: Urgency::Medium,
        status: IncidentStatus::Open,
        reporter: UserId(100),
        assignee: None,
        assigned_at: None,
        tier: SupportTier::FIRST,
        escalation_count: 0,
        last_escalated_at: None,
        escalation_reason: None,
        auto_escalated: false,
        needs_intervention: false,
        created_at: fixed_time(),
        first_response_at: None,
        resolved_at: None,
        closed_at: None,
        response_due: None,
        resolution_due: None,
        version: 0,
    }
}

pub(crate) fn technician_fixture(id: u64, role: Role, tier: u8) -> Technician {
    Technician {
        id: UserId(id),
        name: format!("tech-{}", id),
        email: format!("tech-{}@example.test", id),
        role,
        support_tier: SupportTier::new(tier),
        is_spoc: false,
        spoc_available: false,
        active: true,
        deleted: false,
    }
}
