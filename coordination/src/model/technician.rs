//! Support-facing view of a user

use serde::{Deserialize, Serialize};

use super::{SupportTier, UserId};

/// User role. Only Technician, Supervisor and Administrator are assignable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Reporter without support duties
    EndUser,
    Technician,
    Supervisor,
    Administrator,
}

impl Role {
    pub fn is_assignable(self) -> bool {
        !matches!(self, Self::EndUser)
    }

    /// Supervisor or Administrator
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Supervisor | Self::Administrator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndUser => write!(f, "end_user"),
            Self::Technician => write!(f, "technician"),
            Self::Supervisor => write!(f, "supervisor"),
            Self::Administrator => write!(f, "administrator"),
        }
    }
}

/// A user as seen by the assignment and escalation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    /// Tier this technician receives work for; `None` = no tier
    #[serde(default)]
    pub support_tier: Option<SupportTier>,
    #[serde(default)]
    pub is_spoc: bool,
    #[serde(default)]
    pub spoc_available: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub deleted: bool,
}

fn default_true() -> bool {
    true
}

impl Technician {
    /// Active, not soft-deleted, and of an assignable role
    pub fn is_assignable(&self) -> bool {
        self.active && !self.deleted && self.role.is_assignable()
    }

    /// Whether this technician may receive work at `tier`.
    /// Administrators work any tier.
    pub fn serves_tier(&self, tier: SupportTier) -> bool {
        self.role == Role::Administrator || self.support_tier == Some(tier)
    }

    /// An assignable SPOC whose availability flag is on
    pub fn is_available_spoc(&self) -> bool {
        self.is_spoc && self.spoc_available && self.is_assignable()
    }
}

/// The authenticated caller of an operation, passed explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Identity used for engine-initiated transitions such as the SLA sweep
    pub fn system() -> Self {
        Self {
            user_id: UserId(0),
            role: Role::Administrator,
        }
    }
}
