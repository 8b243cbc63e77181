//! Integration tests for SLA-driven and manual escalation
//!
//! Drives the engine through simulated time with a manual clock and checks
//! the incident, the ledger and the notifications after each sweep.

mod common;

use common::{request, technician, tiered_staff, Harness};
use incident_coordination::store::IncidentStore;
use incident_coordination::{
    Actor, BreachBasis, EngineConfig, EngineContext, EventKind, Impact, IncidentEngine,
    IncidentStatus, Role, SlaTable, SlaTarget, TransitionKind, Urgency, UserId,
};

fn reporter() -> Actor {
    Actor::new(UserId(100), Role::EndUser)
}

/// Test: Critical incident breaches first response after 15 minutes and
/// moves to tier 2 with one automatic history entry
#[tokio::test]
async fn test_critical_breach_escalates_once() {
    let h = Harness::new(tiered_staff()).await;
    let opened = h
        .engine
        .open_incident(request("Core switch down", Impact::High, Urgency::High), &reporter())
        .await
        .into_result()
        .unwrap();
    let id = opened.incident.id;
    assert_eq!(opened.technician, Some(UserId(1)));

    h.minutes(16);
    let swept = h.engine.run_automatic_escalation_sweep().await;
    assert!(swept.success);
    assert_eq!(swept.data, Some(1));

    let incident = h.store.get_incident(id).await.unwrap().unwrap();
    assert_eq!(incident.tier.level(), 2);
    assert_eq!(incident.assignee, Some(UserId(2)));
    assert!(incident.auto_escalated);
    assert_eq!(incident.escalation_count, 1);
    assert_eq!(
        incident.escalation_reason.as_deref(),
        Some("SLA first-response threshold exceeded")
    );

    let history = h.engine.get_escalation_history(id).await.into_result().unwrap();
    let escalations: Vec<_> = history
        .iter()
        .filter(|e| e.kind == TransitionKind::Escalation)
        .collect();
    assert_eq!(escalations.len(), 1);
    assert!(escalations[0].automatic);
    assert_eq!(escalations[0].from_tier.level(), 1);
    assert_eq!(escalations[0].to_tier.level(), 2);
    assert_eq!(escalations[0].from_technician, Some(UserId(1)));
    assert_eq!(escalations[0].to_technician, Some(UserId(2)));

    assert_eq!(h.notifier.count(UserId(2), EventKind::Escalated), 1);
    assert_eq!(h.notifier.count(UserId(9), EventKind::AutoEscalationAlert), 1);
}

/// Test: A sweeper restarted with relaxed SLA targets keeps the due times
/// stamped when the incident was opened
#[tokio::test]
async fn test_restart_with_new_targets_keeps_stamped_deadlines() {
    let h = Harness::new(tiered_staff()).await;
    let opened = h
        .engine
        .open_incident(request("Core switch down", Impact::High, Urgency::High), &reporter())
        .await
        .into_result()
        .unwrap();
    let id = opened.incident.id;

    let relaxed = EngineConfig {
        sla: SlaTable {
            critical: SlaTarget::new(60, 600),
            ..Default::default()
        },
        ..Default::default()
    };
    let restarted = IncidentEngine::new(
        EngineContext::builder(h.store.clone(), relaxed)
            .clock(h.clock.clone())
            .build()
            .unwrap(),
    );

    h.minutes(16);
    let swept = restarted.run_automatic_escalation_sweep().await;
    assert_eq!(swept.data, Some(1));

    let incident = h.store.get_incident(id).await.unwrap().unwrap();
    assert_eq!(incident.tier.level(), 2);
    assert_eq!(
        incident.response_due,
        Some(common::start_time() + chrono::Duration::minutes(15))
    );
}

/// Test: A second sweep at the same instant changes nothing
#[tokio::test]
async fn test_repeated_sweep_is_idempotent() {
    let h = Harness::new(tiered_staff()).await;
    let opened = h
        .engine
        .open_incident(request("Core switch down", Impact::High, Urgency::High), &reporter())
        .await
        .into_result()
        .unwrap();
    let id = opened.incident.id;

    h.minutes(16);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(1));
    let after_first = h.store.get_incident(id).await.unwrap().unwrap();

    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(0));
    let after_second = h.store.get_incident(id).await.unwrap().unwrap();
    assert_eq!(after_first, after_second);

    let stats = h
        .engine
        .get_escalation_statistics()
        .await
        .into_result()
        .unwrap();
    assert_eq!(stats.total_escalations, 1);
}

/// Test: Escalation climbs one tier per missed window, then stops at the
/// ceiling and asks supervisors for intervention exactly once
#[tokio::test]
async fn test_ceiling_flags_intervention_once() {
    let h = Harness::new(tiered_staff()).await;
    let opened = h
        .engine
        .open_incident(request("Datacenter power", Impact::High, Urgency::High), &reporter())
        .await
        .into_result()
        .unwrap();
    let id = opened.incident.id;

    h.minutes(16);
    h.engine.run_automatic_escalation_sweep().await;
    h.minutes(31);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(1));

    let incident = h.store.get_incident(id).await.unwrap().unwrap();
    assert_eq!(incident.tier.level(), 3);
    assert_eq!(incident.assignee, Some(UserId(3)));

    h.minutes(46);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(0));
    h.minutes(61);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(0));

    let incident = h.store.get_incident(id).await.unwrap().unwrap();
    assert_eq!(incident.tier.level(), 3);
    assert!(incident.needs_intervention);
    assert_eq!(h.notifier.count(UserId(9), EventKind::NeedsIntervention), 1);

    let stats = h
        .engine
        .get_escalation_statistics()
        .await
        .into_result()
        .unwrap();
    assert_eq!(stats.total_escalations, 2);
    assert_eq!(stats.automatic_escalations, 2);
}

/// Test: Under the since-last-escalation basis the window restarts at
/// each escalation
#[tokio::test]
async fn test_since_last_escalation_basis_restarts_window() {
    let config = EngineConfig {
        breach_basis: BreachBasis::SinceLastEscalation,
        ..Default::default()
    };
    let h = Harness::with_config(tiered_staff(), config).await;
    let opened = h
        .engine
        .open_incident(request("ERP down", Impact::High, Urgency::High), &reporter())
        .await
        .into_result()
        .unwrap();
    let id = opened.incident.id;

    h.minutes(20);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(1));

    // 32 minutes is past 2x15 from creation but only 12 since the escalation
    h.minutes(32);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(0));

    h.minutes(36);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(1));
    let incident = h.store.get_incident(id).await.unwrap().unwrap();
    assert_eq!(incident.tier.level(), 3);
}

/// Test: Recording a first response stops first-response escalation;
/// the resolution window still applies
#[tokio::test]
async fn test_first_response_switches_to_resolution_window() {
    let h = Harness::new(tiered_staff()).await;
    let opened = h
        .engine
        .open_incident(request("Payroll job", Impact::High, Urgency::High), &reporter())
        .await
        .into_result()
        .unwrap();
    let id = opened.incident.id;

    h.minutes(5);
    let assignee = Actor::new(UserId(1), Role::Technician);
    assert!(h.engine.record_first_response(id, &assignee).await.success);

    h.minutes(200);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(0));

    h.minutes(241);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(1));
    let incident = h.store.get_incident(id).await.unwrap().unwrap();
    assert_eq!(
        incident.escalation_reason.as_deref(),
        Some("SLA resolution threshold exceeded")
    );
}

/// Test: Manual escalations record the actor and reason; a targeted
/// escalation to the current tier is rejected
#[tokio::test]
async fn test_manual_escalation_path() {
    let h = Harness::new(tiered_staff()).await;
    let opened = h
        .engine
        .open_incident(request("Printer queue", Impact::Low, Urgency::Medium), &reporter())
        .await
        .into_result()
        .unwrap();
    let id = opened.incident.id;

    let tech = Actor::new(UserId(1), Role::Technician);
    let next = h
        .engine
        .escalate_to_next_tier(id, "driver issue beyond tier 1", None, &tech)
        .await;
    assert!(next.success, "{}", next.message);
    assert_eq!(next.technician_id, Some(UserId(2)));

    let denied = h
        .engine
        .escalate_to_tier(id, 3, "vendor needed", None, &tech)
        .await;
    assert_eq!(denied.error.unwrap().code, "UNAUTHORIZED");

    let sup = Actor::new(UserId(9), Role::Supervisor);
    let to_three = h
        .engine
        .escalate_to_tier(id, 3, "vendor needed", None, &sup)
        .await;
    assert!(to_three.success);
    assert_eq!(to_three.to_tier.map(|t| t.level()), Some(3));

    let again = h
        .engine
        .escalate_to_tier(id, 3, "vendor needed", None, &sup)
        .await;
    assert!(!again.success);
    assert_eq!(again.error.unwrap().code, "VALIDATION");

    let history = h.engine.get_escalation_history(id).await.into_result().unwrap();
    let manual: Vec<_> = history.iter().filter(|e| e.is_escalation()).collect();
    assert_eq!(manual.len(), 2);
    assert!(manual.iter().all(|e| !e.automatic));
    assert_eq!(manual[0].actor, Some(UserId(1)));
    assert_eq!(manual[1].actor, Some(UserId(9)));
    assert_eq!(manual[1].reason, "vendor needed");

    let stats = h
        .engine
        .get_escalation_statistics()
        .await
        .into_result()
        .unwrap();
    assert_eq!(stats.manual_escalations, 2);
    assert_eq!(stats.by_destination_tier.get(&3), Some(&1));
}

/// Test: Closed incidents reject escalation with a terminal error
#[tokio::test]
async fn test_closed_incident_rejects_escalation() {
    let h = Harness::new(tiered_staff()).await;
    let opened = h
        .engine
        .open_incident(request("Old laptop", Impact::Low, Urgency::Low), &reporter())
        .await
        .into_result()
        .unwrap();
    let id = opened.incident.id;
    let tech = Actor::new(UserId(1), Role::Technician);

    assert!(h.engine.resolve(id, &tech).await.success);
    let closed = h.engine.close(id, &tech).await.into_result().unwrap();
    assert_eq!(closed.status, IncidentStatus::Closed);

    let result = h
        .engine
        .escalate_to_next_tier(id, "too late", None, &tech)
        .await;
    assert!(!result.success);
    assert_eq!(result.error.unwrap().code, "INCIDENT_TERMINAL");
    let history = h.engine.get_escalation_history(id).await;
    assert_eq!(history.data.map(|entries| entries.len()), Some(1));
}

/// Test: With no tier-2 staff the incident still escalates, unassigned
#[tokio::test]
async fn test_escalation_without_candidates_leaves_unassigned() {
    let h = Harness::new(vec![
        technician(1, Role::Technician, Some(1)),
        technician(9, Role::Supervisor, None),
    ])
    .await;
    let opened = h
        .engine
        .open_incident(request("Core switch down", Impact::High, Urgency::High), &reporter())
        .await
        .into_result()
        .unwrap();

    h.minutes(16);
    assert_eq!(h.engine.run_automatic_escalation_sweep().await.data, Some(1));
    let incident = h.store.get_incident(opened.incident.id).await.unwrap().unwrap();
    assert_eq!(incident.tier.level(), 2);
    assert_eq!(incident.assignee, None);
    assert!(h.audit.actions().contains(&"incident.escalated".to_string()));
}
