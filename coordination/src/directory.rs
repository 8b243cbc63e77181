//! Technician directory: read-only view over users
//!
//! Workloads are recomputed from the incident table on every call and never
//! cached: a workload is the number of incidents assigned to the technician
//! whose status is neither Closed nor Cancelled.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::balancer::Candidate;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{Role, SupportTier, Technician, UserId};
use crate::store::{IncidentStore, SharedStore, TechnicianFilter, TechnicianStore};

#[derive(Clone)]
pub struct TechnicianDirectory {
    store: SharedStore,
    config: Arc<EngineConfig>,
}

impl TechnicianDirectory {
    pub fn new(store: SharedStore, config: Arc<EngineConfig>) -> Self {
        Self { store, config }
    }

    /// Active technicians who serve `tier` and meet the category's role
    /// requirement. Administrators serve every tier.
    pub async fn list_eligible(
        &self,
        tier: SupportTier,
        category: &str,
    ) -> EngineResult<Vec<Technician>> {
        let route = self.config.route_for(category);
        let technicians = self
            .store
            .list_active_technicians(&TechnicianFilter::default())
            .await?;

        let eligible: Vec<Technician> = technicians
            .into_iter()
            .filter(|t| t.is_assignable() && t.serves_tier(tier) && t.role >= route.role)
            .collect();

        debug!(
            %tier,
            category,
            required_role = %route.role,
            count = eligible.len(),
            "Listed eligible technicians"
        );
        Ok(eligible)
    }

    /// Live open-incident count for one technician
    pub async fn workload_of(&self, technician: UserId) -> EngineResult<u32> {
        Ok(self
            .workloads()
            .await?
            .get(&technician)
            .copied()
            .unwrap_or(0))
    }

    /// Open-incident counts for every assignee, computed in one pass
    pub async fn workloads(&self) -> EngineResult<HashMap<UserId, u32>> {
        let open = self.store.list_non_terminal_incidents().await?;
        let mut counts = HashMap::new();
        for assignee in open.iter().filter_map(|i| i.assignee) {
            *counts.entry(assignee).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Pair technicians with workloads from a single snapshot
    pub async fn candidates(&self, technicians: Vec<Technician>) -> EngineResult<Vec<Candidate>> {
        let workloads = self.workloads().await?;
        Ok(technicians
            .into_iter()
            .map(|t| {
                let load = workloads.get(&t.id).copied().unwrap_or(0);
                Candidate::new(t, load)
            })
            .collect())
    }

    /// SPOCs that are assignable and currently available
    pub async fn available_spocs(&self) -> EngineResult<Vec<Technician>> {
        Ok(self
            .store
            .list_active_technicians(&TechnicianFilter::spocs())
            .await?
            .into_iter()
            .filter(Technician::is_available_spoc)
            .collect())
    }

    /// Active supervisors, the audience for automatic-escalation alerts
    pub async fn supervisors(&self) -> EngineResult<Vec<Technician>> {
        Ok(self
            .store
            .list_active_technicians(&TechnicianFilter::role(Role::Supervisor))
            .await?)
    }

    pub async fn get(&self, id: UserId) -> EngineResult<Technician> {
        self.store
            .get_technician(id)
            .await?
            .ok_or(EngineError::UserNotFound { id })
    }

    /// Load a technician and check they can receive work
    pub async fn require_assignable(&self, id: UserId) -> EngineResult<Technician> {
        let technician = self.get(id).await?;
        if !technician.is_assignable() {
            return Err(EngineError::validation(format!(
                "user {} cannot receive incidents (role {}, active {})",
                id,
                technician.role,
                technician.active && !technician.deleted
            )));
        }
        Ok(technician)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IncidentStatus;
    use crate::store::{IncidentStore, MemoryStore, TechnicianStore};
    use crate::testing::{incident_fixture, technician_fixture};

    async fn setup() -> (TechnicianDirectory, SharedStore) {
        let store = MemoryStore::new().shared();
        let directory = TechnicianDirectory::new(store.clone(), Arc::new(EngineConfig::default()));
        (directory, store)
    }

    #[tokio::test]
    async fn test_workload_excludes_terminal_incidents() {
        let (directory, store) = setup().await;
        for status in [
            IncidentStatus::Open,
            IncidentStatus::InProgress,
            IncidentStatus::Resolved,
            IncidentStatus::Closed,
            IncidentStatus::Cancelled,
        ] {
            let mut inc = incident_fixture();
            inc.assignee = Some(UserId(10));
            inc.status = status;
            store.insert_incident(inc).await.unwrap();
        }

        assert_eq!(directory.workload_of(UserId(10)).await.unwrap(), 3);
        assert_eq!(directory.workload_of(UserId(11)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_eligible_respects_tier_and_category_role() {
        let (directory, store) = setup().await;
        store
            .save_technician(&technician_fixture(1, Role::Technician, 1))
            .await
            .unwrap();
        store
            .save_technician(&technician_fixture(2, Role::Technician, 2))
            .await
            .unwrap();
        store
            .save_technician(&technician_fixture(3, Role::Supervisor, 1))
            .await
            .unwrap();
        let mut admin = technician_fixture(4, Role::Administrator, 1);
        admin.support_tier = None;
        store.save_technician(&admin).await.unwrap();

        let ids = |v: Vec<Technician>| v.into_iter().map(|t| t.id.0).collect::<Vec<_>>();

        let hardware = directory
            .list_eligible(SupportTier::FIRST, "Hardware")
            .await
            .unwrap();
        assert_eq!(ids(hardware), vec![1, 3, 4]);

        let email = directory
            .list_eligible(SupportTier::FIRST, "Email")
            .await
            .unwrap();
        assert_eq!(ids(email), vec![3, 4]);

        let tier2 = directory
            .list_eligible(SupportTier::FIRST.next(), "Hardware")
            .await
            .unwrap();
        assert_eq!(ids(tier2), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_require_assignable_rejects_end_user() {
        let (directory, store) = setup().await;
        store
            .save_technician(&technician_fixture(5, Role::EndUser, 1))
            .await
            .unwrap();
        let err = directory.require_assignable(UserId(5)).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));

        let err = directory.require_assignable(UserId(99)).await.unwrap_err();
        assert!(matches!(err, EngineError::UserNotFound { .. }));
    }
}
