//! SLA breach detector: periodic sweep over open incidents
//!
//! Each sweep takes one snapshot of the non-terminal incidents and feeds the
//! breached ones to the escalation engine. One incident failing never aborts
//! the batch: conflicts are skipped, other errors are logged and counted.
//! Cancellation is cooperative and checked between incidents, so an
//! escalation that already started is allowed to commit.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::EngineContext;
use crate::error::EngineResult;
use crate::escalation::{AutoEscalationOutcome, EscalationEngine};
use crate::sla::evaluate_breach;
use crate::store::IncidentStore;

/// Summary of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub breached: usize,
    pub escalated: usize,
    /// Breached but already at the highest tier
    pub at_ceiling: usize,
    /// Lost a race or became terminal since the snapshot
    pub skipped: usize,
    pub failed: usize,
    /// Stopped early because the token was cancelled
    pub cancelled: bool,
    pub started_at: Option<DateTime<Utc>>,
}

pub struct BreachDetector {
    ctx: EngineContext,
    engine: EscalationEngine,
}

impl BreachDetector {
    pub fn new(ctx: EngineContext, engine: EscalationEngine) -> Self {
        Self { ctx, engine }
    }

    /// Run one sweep at the context clock's current time
    pub async fn sweep(&self, cancel: &CancellationToken) -> EngineResult<SweepReport> {
        let now = self.ctx.clock.now();
        let config = &self.ctx.config;
        let incidents = self.ctx.store.list_non_terminal_incidents().await?;

        let mut report = SweepReport {
            started_at: Some(now),
            ..Default::default()
        };

        for incident in incidents {
            if cancel.is_cancelled() {
                info!(
                    examined = report.examined,
                    escalated = report.escalated,
                    "SLA sweep cancelled"
                );
                report.cancelled = true;
                break;
            }
            report.examined += 1;

            let Some(breach) = evaluate_breach(&incident, &config.sla, config.breach_basis, now)
            else {
                continue;
            };
            report.breached += 1;
            let id = incident.id;
            debug!(incident = %id, %breach, tier = %incident.tier, "SLA breach detected");

            match self.engine.escalate_automatically(incident, breach).await {
                Ok(AutoEscalationOutcome::Escalated(_)) => report.escalated += 1,
                Ok(AutoEscalationOutcome::AtCeiling { .. }) => report.at_ceiling += 1,
                Err(e) if e.is_conflict() => {
                    warn!(incident = %id, "Skipping incident in sweep: {}", e);
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(incident = %id, "Automatic escalation failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            breached = report.breached,
            escalated = report.escalated,
            at_ceiling = report.at_ceiling,
            skipped = report.skipped,
            failed = report.failed,
            "SLA sweep complete"
        );
        Ok(report)
    }

    /// Run the sweep every `period` until `cancel` fires
    pub fn spawn_periodic(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs_f64(), "SLA sweep task started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep(&cancel).await {
                            error!("SLA sweep failed: {}", e);
                        }
                    }
                }
            }
            info!("SLA sweep task stopped");
        })
    }
}
