//! # Configuration
//!
//! `venture.toml` layout:
//!
//! ```toml
//! catalog_path = "data/catalog.toml"   # optional, builtin catalog otherwise
//! ledger_path = "venture.vldg"         # optional, no journaling otherwise
//!
//! [rewards]
//! base_reward_unit = 50
//! default_map_multiplier = 1.0
//!
//! [combat]
//! crit_multiplier = 1.5
//!
//! [sessions]
//! idle_timeout_secs = 300
//! idle_outcome = "auto_flee"
//! ```
//!
//! Every section and field is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use venture_combat::{CombatTuning, SessionPolicy};
use venture_economy::{Catalog, Ledger, MemoryStore, PlayerRecord};

use crate::error::{VentureError, VentureResult};

/// Coin and XP scaling for rewards and penalties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSettings {
    /// Unit that battle rewards and penalties are proportional to.
    pub base_reward_unit: u64,
    /// Map multiplier used when exploration does not name one.
    pub default_map_multiplier: f64,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            base_reward_unit: 50,
            default_map_multiplier: 1.0,
        }
    }
}

/// Service configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VentureConfig {
    /// Reward scaling.
    pub rewards: RewardSettings,
    /// Combat balance.
    pub combat: CombatTuning,
    /// Session expiry.
    pub sessions: SessionPolicy,
    /// Catalog file. The bundled catalog is used when absent.
    pub catalog_path: Option<PathBuf>,
    /// Ledger file. Player mutations are not journaled when absent.
    pub ledger_path: Option<PathBuf>,
}

impl VentureConfig {
    /// Reads and validates a config file.
    ///
    /// Relative `catalog_path` and `ledger_path` values resolve against the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> VentureResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VentureError::Config(format!("failed to read {}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;

        if let Some(base) = path.parent() {
            config.catalog_path = config.catalog_path.map(|p| resolve(base, p));
            config.ledger_path = config.ledger_path.map(|p| resolve(base, p));
        }

        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses and validates config text.
    ///
    /// # Errors
    ///
    /// Returns `Config` on malformed TOML or out-of-range values.
    pub fn from_toml_str(text: &str) -> VentureResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| VentureError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first bad value.
    pub fn validate(&self) -> VentureResult<()> {
        let multiplier = self.rewards.default_map_multiplier;
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(VentureError::Config(format!(
                "rewards.default_map_multiplier = {multiplier} must be a non-negative number"
            )));
        }
        if self.sessions.idle_timeout_secs == 0 {
            return Err(VentureError::Config(
                "sessions.idle_timeout_secs must be positive".to_string(),
            ));
        }
        self.combat
            .validate()
            .map_err(|e| VentureError::Config(e.to_string()))
    }

    /// Loads the configured catalog, or the bundled one.
    ///
    /// # Errors
    ///
    /// Returns the catalog's load or validation error.
    pub fn load_catalog(&self) -> VentureResult<Catalog> {
        let catalog = match &self.catalog_path {
            Some(path) => Catalog::load(path)?,
            None => Catalog::builtin()?,
        };
        Ok(catalog)
    }

    /// Builds the player store from `roster`.
    ///
    /// With a `ledger_path`, every journaled mutation is replayed on top of
    /// `roster`, so balances survive a restart. `roster` must be the same
    /// starting records each time the ledger is reopened.
    ///
    /// # Errors
    ///
    /// Returns the ledger's open or replay error.
    pub fn open_store(
        &self,
        roster: impl IntoIterator<Item = PlayerRecord>,
    ) -> VentureResult<MemoryStore> {
        match &self.ledger_path {
            Some(path) => Ok(MemoryStore::recover(roster, Ledger::open(path)?)?),
            None => {
                let store = MemoryStore::new();
                for record in roster {
                    store.insert_player(record);
                }
                Ok(store)
            }
        }
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_combat::IdleOutcome;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = VentureConfig::from_toml_str("").unwrap();
        assert_eq!(config, VentureConfig::default());
        assert_eq!(config.rewards.base_reward_unit, 50);
        assert_eq!(config.sessions.idle_timeout_secs, 300);
        assert_eq!(config.sessions.idle_outcome, IdleOutcome::AutoFlee);
    }

    #[test]
    fn test_partial_sections() {
        let config = VentureConfig::from_toml_str(
            r#"
            [rewards]
            base_reward_unit = 80

            [combat]
            crit_multiplier = 2.0

            [sessions]
            idle_outcome = "auto_forfeit"
            "#,
        )
        .unwrap();

        assert_eq!(config.rewards.base_reward_unit, 80);
        assert!((config.rewards.default_map_multiplier - 1.0).abs() < f64::EPSILON);
        assert!((config.combat.crit_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.combat.energy_regen, 10);
        assert_eq!(config.sessions.idle_outcome, IdleOutcome::AutoForfeit);
        assert_eq!(config.sessions.idle_timeout_secs, 300);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(VentureConfig::from_toml_str("[sessions]\nidle_timeout_secs = 0").is_err());
        assert!(VentureConfig::from_toml_str("[combat]\nempowered_chance = 2.0").is_err());
        assert!(VentureConfig::from_toml_str("[rewards]\nbase_reward_unit = \"lots\"").is_err());
    }

    #[test]
    fn test_bundled_config_parses() {
        let config =
            VentureConfig::from_toml_str(include_str!("../config/venture.toml")).unwrap();
        assert!(config.load_catalog().is_ok());
    }
}
