//! Seed data for the in-memory store
//!
//! A TOML file with `[[technicians]]` and `[[incidents]]` tables. Incidents
//! can be backdated with `opened_minutes_ago` so a sweep has something to
//! find right after startup.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use incident_coordination::sla::due_timestamps;
use incident_coordination::store::{IncidentStore, TechnicianStore};
use incident_coordination::{
    Impact, Incident, IncidentEngine, IncidentId, IncidentStatus, Priority, SupportTier,
    Technician, TicketNumber, Urgency, UserId,
};

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub technicians: Vec<Technician>,
    #[serde(default)]
    pub incidents: Vec<SeedIncident>,
}

#[derive(Debug, Deserialize)]
pub struct SeedIncident {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub impact: Impact,
    pub urgency: Urgency,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub reporter: UserId,
    #[serde(default)]
    pub assignee: Option<UserId>,
    #[serde(default)]
    pub tier: Option<SupportTier>,
    #[serde(default)]
    pub opened_minutes_ago: i64,
}

/// Counts of what a seed file put into the store
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub technicians: usize,
    pub incidents: usize,
    pub auto_assigned: usize,
}

impl SeedFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid seed file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Insert everything into the engine's store. Incidents without an
    /// assignee go through automatic assignment.
    pub async fn apply(self, engine: &IncidentEngine, now: DateTime<Utc>) -> Result<SeedSummary> {
        let ctx = engine.context();
        let mut summary = SeedSummary::default();

        for technician in &self.technicians {
            ctx.store.save_technician(technician).await?;
            summary.technicians += 1;
        }

        for seed in self.incidents {
            let created_at = now - Duration::minutes(seed.opened_minutes_ago.max(0));
            let priority = seed
                .priority
                .unwrap_or_else(|| Priority::from_matrix(seed.impact, seed.urgency));
            let period = TicketNumber::period_of(created_at);
            let sequence = ctx.store.next_ticket_sequence(&period).await?;
            let (response_due, resolution_due) =
                due_timestamps(ctx.config.sla.target_for(priority), created_at);

            let status = if seed.assignee.is_some() {
                IncidentStatus::InProgress
            } else {
                IncidentStatus::Open
            };
            let incident = ctx
                .store
                .insert_incident(Incident {
                    id: IncidentId(0),
                    ticket_number: TicketNumber::format(&period, sequence),
                    title: seed.title,
                    description: seed.description,
                    category: seed.category,
                    priority,
                    impact: seed.impact,
                    urgency: seed.urgency,
                    status,
                    reporter: seed.reporter,
                    assignee: seed.assignee,
                    assigned_at: seed.assignee.map(|_| created_at),
                    tier: seed.tier.unwrap_or(SupportTier::FIRST),
                    escalation_count: 0,
                    last_escalated_at: None,
                    escalation_reason: None,
                    auto_escalated: false,
                    needs_intervention: false,
                    created_at,
                    first_response_at: None,
                    resolved_at: None,
                    closed_at: None,
                    response_due: Some(response_due),
                    resolution_due: Some(resolution_due),
                    version: 0,
                })
                .await?;
            summary.incidents += 1;

            if incident.assignee.is_none() {
                let result = engine.auto_assign(incident.id).await;
                if result.technician_id.is_some() {
                    summary.auto_assigned += 1;
                } else {
                    warn!(ticket = %incident.ticket_number, "{}", result.message);
                }
            }
        }

        info!(
            technicians = summary.technicians,
            incidents = summary.incidents,
            auto_assigned = summary.auto_assigned,
            "Seed data loaded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_coordination::{EngineConfig, EngineContext, MemoryStore};

    const SEED: &str = r#"
[[technicians]]
id = 1
name = "Ana"
role = "technician"
support_tier = 1

[[technicians]]
id = 2
name = "Ben"
role = "technician"
support_tier = 2

[[incidents]]
title = "Core switch down"
category = "Network"
impact = "high"
urgency = "high"
reporter = 100
opened_minutes_ago = 20

[[incidents]]
title = "Legacy printer"
category = "Hardware"
impact = "low"
urgency = "low"
reporter = 101
assignee = 2
tier = 2
"#;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-09T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_seed_loads_and_assigns() {
        let store = MemoryStore::new().shared();
        let ctx = EngineContext::new(store.clone(), EngineConfig::default()).unwrap();
        let engine = IncidentEngine::new(ctx);

        let summary = SeedFile::parse(SEED)
            .unwrap()
            .apply(&engine, now())
            .await
            .unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                technicians: 2,
                incidents: 2,
                auto_assigned: 1,
            }
        );

        let first = store.get_incident(IncidentId(1)).await.unwrap().unwrap();
        assert_eq!(first.priority, Priority::Critical);
        assert_eq!(first.created_at, now() - Duration::minutes(20));
        assert_eq!(first.assignee, Some(UserId(1)));
        assert_eq!(first.ticket_number.0, "INC-202603-00001");

        let second = store.get_incident(IncidentId(2)).await.unwrap().unwrap();
        assert_eq!(second.tier.level(), 2);
        assert_eq!(second.status, IncidentStatus::InProgress);
    }

    #[test]
    fn test_seed_rejects_tier_zero() {
        let bad = r#"
[[technicians]]
id = 1
name = "Ana"
role = "technician"
support_tier = 0
"#;
        assert!(SeedFile::parse(bad).is_err());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SeedFile::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read seed file"));
    }
}
