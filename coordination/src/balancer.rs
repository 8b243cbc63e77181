//! Load balancer: least-loaded technician selection
//!
//! Pure function over a workload snapshot. Ties on workload break on the
//! lowest technician id so the choice is reproducible.

use serde::{Deserialize, Serialize};

use crate::model::{Technician, UserId};

/// A technician paired with their live open-incident count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub technician: Technician,
    pub workload: u32,
}

impl Candidate {
    pub fn new(technician: Technician, workload: u32) -> Self {
        Self {
            technician,
            workload,
        }
    }

    pub fn id(&self) -> UserId {
        self.technician.id
    }
}

/// Pick the candidate with the minimum workload, lowest id on ties.
///
/// Inactive or non-assignable candidates are ignored. `None` means nobody
/// is eligible, which callers treat as "leave unassigned".
pub fn select_least_loaded(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .filter(|c| c.technician.is_assignable())
        .min_by_key(|c| (c.workload, c.technician.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use crate::testing::technician_fixture;

    fn cand(id: u64, workload: u32) -> Candidate {
        Candidate::new(technician_fixture(id, Role::Technician, 1), workload)
    }

    #[test]
    fn test_empty_returns_none() {
        assert!(select_least_loaded(&[]).is_none());
    }

    #[test]
    fn test_strict_minimum_wins() {
        let cands = vec![cand(1, 4), cand(2, 1), cand(3, 3)];
        assert_eq!(select_least_loaded(&cands).map(Candidate::id), Some(UserId(2)));
    }

    #[test]
    fn test_tie_breaks_on_lowest_id() {
        let cands = vec![cand(9, 2), cand(4, 2), cand(6, 5)];
        assert_eq!(select_least_loaded(&cands).map(Candidate::id), Some(UserId(4)));
    }

    #[test]
    fn test_order_of_input_does_not_matter() {
        let a = vec![cand(3, 0), cand(1, 0), cand(2, 0)];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(
            select_least_loaded(&a).map(Candidate::id),
            select_least_loaded(&b).map(Candidate::id)
        );
    }

    #[test]
    fn test_inactive_candidates_skipped() {
        let mut idle = cand(1, 0);
        idle.technician.active = false;
        let cands = vec![idle, cand(2, 7)];
        assert_eq!(select_least_loaded(&cands).map(Candidate::id), Some(UserId(2)));
    }

    #[test]
    fn test_all_ineligible_returns_none() {
        let mut a = cand(1, 0);
        a.technician.role = Role::EndUser;
        let mut b = cand(2, 0);
        b.technician.deleted = true;
        assert!(select_least_loaded(&[a, b]).is_none());
    }
}
