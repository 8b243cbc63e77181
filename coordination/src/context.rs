//! Shared handles used by the coordinator, escalation engine and sweep

use std::sync::Arc;

use tracing::{debug, warn};

use crate::audit::{AuditEvent, SharedAuditSink, TracingAuditSink};
use crate::balancer::select_least_loaded;
use crate::clock::{SharedClock, SystemClock};
use crate::config::{ConfigError, EngineConfig};
use crate::directory::TechnicianDirectory;
use crate::error::EngineResult;
use crate::ledger::EscalationLedger;
use crate::model::{SupportTier, Technician};
use crate::notify::{NotificationDispatcher, SharedNotifier, TracingNotifier};
use crate::store::SharedStore;

/// Collaborators and configuration shared by every engine component
#[derive(Clone)]
pub struct EngineContext {
    pub store: SharedStore,
    pub config: Arc<EngineConfig>,
    pub directory: TechnicianDirectory,
    pub ledger: EscalationLedger,
    pub notifications: Arc<NotificationDispatcher>,
    pub audit: SharedAuditSink,
    pub clock: SharedClock,
}

impl EngineContext {
    /// Context with logging-only notifier and audit sink and the system clock.
    /// Fails when `config` does not validate.
    pub fn new(store: SharedStore, config: EngineConfig) -> Result<Self, ConfigError> {
        Self::builder(store, config).build()
    }

    pub fn builder(store: SharedStore, config: EngineConfig) -> EngineContextBuilder {
        EngineContextBuilder {
            store,
            config,
            notifier: Arc::new(TracingNotifier),
            audit: Arc::new(TracingAuditSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// Least-loaded eligible technician for a tier and category, from one
    /// workload snapshot. `None` is a valid outcome and is logged at warn.
    pub async fn least_loaded_for(
        &self,
        tier: SupportTier,
        category: &str,
    ) -> EngineResult<Option<Technician>> {
        let eligible = self.directory.list_eligible(tier, category).await?;
        let candidates = self.directory.candidates(eligible).await?;
        match select_least_loaded(&candidates) {
            Some(chosen) => {
                debug!(
                    technician = %chosen.id(),
                    workload = chosen.workload,
                    %tier,
                    "Selected least-loaded technician"
                );
                Ok(Some(chosen.technician.clone()))
            }
            None => {
                warn!(%tier, category, "No eligible technician available");
                Ok(None)
            }
        }
    }

    pub(crate) fn record(&self, event: AuditEvent) {
        self.audit.record(event.at(self.clock.now()));
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for `EngineContext`
pub struct EngineContextBuilder {
    store: SharedStore,
    config: EngineConfig,
    notifier: SharedNotifier,
    audit: SharedAuditSink,
    clock: SharedClock,
}

impl EngineContextBuilder {
    pub fn notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn audit(mut self, audit: SharedAuditSink) -> Self {
        self.audit = audit;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<EngineContext, ConfigError> {
        self.config.validate()?;
        let config = Arc::new(self.config);
        Ok(EngineContext {
            directory: TechnicianDirectory::new(self.store.clone(), config.clone()),
            ledger: EscalationLedger::new(self.store.clone()),
            notifications: Arc::new(NotificationDispatcher::new(self.notifier, self.clock.clone())),
            store: self.store,
            config,
            audit: self.audit,
            clock: self.clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_build_rejects_invalid_config() {
        let single_tier = EngineConfig {
            max_tier: 1,
            ..Default::default()
        };
        let err = EngineContext::new(MemoryStore::new().shared(), single_tier).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let zero = EngineConfig {
            max_tier: 0,
            ..Default::default()
        };
        assert!(EngineContext::builder(MemoryStore::new().shared(), zero)
            .build()
            .is_err());
    }

    #[test]
    fn test_build_accepts_defaults() {
        let ctx = EngineContext::new(MemoryStore::new().shared(), EngineConfig::default()).unwrap();
        assert_eq!(ctx.config.max_tier().level(), 3);
    }
}
