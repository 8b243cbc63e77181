//! Domain model: incidents, technicians and support tiers
//!
//! These are plain data types. Every decision that reads them lives in the
//! directory, balancer, escalation and assignment modules.

pub mod incident;
pub mod technician;

use serde::{Deserialize, Serialize};

pub use incident::{Impact, Incident, IncidentStatus, NewIncident, Priority, TicketNumber, Urgency};
pub use technician::{Actor, Role, Technician};

/// Numeric identifier of an incident row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(pub u64);

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric identifier of a user (reporters and technicians share the space)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered support level an incident's ownership can be raised through.
///
/// Tier 1 is front-line, tier 2 specialist, tier 3 vendor/administrator.
/// The upper bound is configuration (`EngineConfig::max_tier`), not a type
/// invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SupportTier(u8);

impl SupportTier {
    /// Front-line support, where every incident starts
    pub const FIRST: SupportTier = SupportTier(1);

    /// Build a tier from its level. Level 0 is not a tier.
    pub fn new(level: u8) -> Option<Self> {
        (level >= 1).then_some(Self(level))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// The tier directly above this one
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Human-readable label for the first three tiers
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "front-line",
            2 => "specialist",
            3 => "vendor",
            _ => "extended",
        }
    }
}

impl TryFrom<u8> for SupportTier {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level).ok_or_else(|| "support tier must be >= 1".to_string())
    }
}

impl From<SupportTier> for u8 {
    fn from(tier: SupportTier) -> u8 {
        tier.0
    }
}

impl Default for SupportTier {
    fn default() -> Self {
        Self::FIRST
    }
}

impl std::fmt::Display for SupportTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_zero_rejected() {
        assert!(SupportTier::new(0).is_none());
        assert_eq!(SupportTier::new(2).map(SupportTier::level), Some(2));
    }

    #[test]
    fn test_tier_ordering_and_next() {
        let t1 = SupportTier::FIRST;
        let t2 = t1.next();
        assert!(t2 > t1);
        assert_eq!(t2.level(), 2);
        assert_eq!(t2.label(), "specialist");
        assert_eq!(t2.to_string(), "tier 2");
    }

    #[test]
    fn test_tier_deserialize_rejects_zero() {
        let ok: SupportTier = serde_json::from_str("2").unwrap();
        assert_eq!(ok.level(), 2);
        assert!(serde_json::from_str::<SupportTier>("0").is_err());
    }
}
