//! Engine configuration
//!
//! Loaded from TOML. The category routing table replaces scattered
//! per-category conditionals: each category names the tier that picks up
//! new incidents and the minimum role allowed to work them.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{Role, SupportTier};
use crate::sla::{BreachBasis, SlaTable};

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Where incidents of a category are routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRoute {
    /// Tier that receives new incidents of this category
    pub tier: SupportTier,
    /// Minimum role required to work the category
    pub role: Role,
}

impl CategoryRoute {
    pub const fn new(tier: SupportTier, role: Role) -> Self {
        Self { tier, role }
    }
}

impl Default for CategoryRoute {
    fn default() -> Self {
        Self::new(SupportTier::FIRST, Role::Technician)
    }
}

/// Configuration for the assignment and escalation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Highest tier; automatic escalation stops here
    pub max_tier: u8,
    /// What SLA elapsed time is measured from
    pub breach_basis: BreachBasis,
    /// Seconds between periodic sweeps
    pub sweep_interval_secs: u64,
    /// Per-priority SLA targets
    pub sla: SlaTable,
    /// Route used for categories missing from `categories`
    pub default_route: CategoryRoute,
    /// Category name → route (names match case-insensitively)
    pub categories: HashMap<String, CategoryRoute>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let technician = CategoryRoute::new(SupportTier::FIRST, Role::Technician);
        let supervisor = CategoryRoute::new(SupportTier::FIRST, Role::Supervisor);
        let categories = [
            ("Hardware", technician),
            ("Software", technician),
            ("Network", technician),
            ("Access", supervisor),
            ("Email", supervisor),
        ]
        .into_iter()
        .map(|(name, route)| (name.to_string(), route))
        .collect();

        Self {
            max_tier: 3,
            breach_basis: BreachBasis::default(),
            sweep_interval_secs: 60,
            sla: SlaTable::default(),
            default_route: technician,
            categories,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tier < 2 {
            return Err(ConfigError::Invalid(format!(
                "max_tier must be >= 2, got {}",
                self.max_tier
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be > 0".to_string(),
            ));
        }
        for (priority, target) in self.sla.all() {
            if target.first_response_minutes == 0 || target.resolution_minutes == 0 {
                return Err(ConfigError::Invalid(format!(
                    "SLA target for {} priority must be non-zero",
                    priority
                )));
            }
        }
        let routes = std::iter::once(("<default>", &self.default_route))
            .chain(self.categories.iter().map(|(k, v)| (k.as_str(), v)));
        for (name, route) in routes {
            if route.tier.level() > self.max_tier {
                return Err(ConfigError::Invalid(format!(
                    "category {} routes to {} above max_tier {}",
                    name, route.tier, self.max_tier
                )));
            }
            if !route.role.is_assignable() {
                return Err(ConfigError::Invalid(format!(
                    "category {} requires non-assignable role {}",
                    name, route.role
                )));
            }
        }
        Ok(())
    }

    /// Route for a category, falling back to `default_route`
    pub fn route_for(&self, category: &str) -> CategoryRoute {
        self.categories
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(category))
            .map(|(_, route)| *route)
            .unwrap_or(self.default_route)
    }

    pub fn max_tier(&self) -> SupportTier {
        SupportTier::new(self.max_tier).unwrap_or(SupportTier::FIRST)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}
