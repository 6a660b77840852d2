//! # Combat Tuning
//!
//! Balance knobs for round resolution and outcomes. Loaded from the
//! `[combat]` table of the service configuration; every field has a default.

use serde::{Deserialize, Serialize};
use venture_economy::{EconomyError, EconomyResult};

/// Balance parameters for combat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Energy a session starts with.
    pub starting_energy: u32,
    /// Energy regenerated every round.
    pub energy_regen: u32,
    /// Extra energy on a round where the player landed a hit.
    pub energy_on_hit: u32,
    /// Ultimate charge gained every round.
    pub ultimate_gain: u32,
    /// Extra charge on a round where the player landed a hit.
    pub ultimate_on_hit: u32,
    /// Damage factor of a critical hit.
    pub crit_multiplier: f64,
    /// Damage factor applied to the first creature hit after a defend.
    pub defend_damage_reduction: f64,
    /// Rounds before defend can be used again, counting the round of use.
    pub defend_cooldown: u32,
    /// Rage a creature builds each round.
    pub rage_per_round: f64,
    /// Creature damage bonus at full rage.
    pub rage_damage_bonus: f64,
    /// Chance a creature spawns empowered.
    pub empowered_chance: f64,
    /// HP and attack factor of an empowered creature.
    pub empowered_stat_bonus: f64,
    /// Coin and XP factor for beating an empowered creature.
    pub empowered_reward_bonus: f64,
    /// Creature stat growth per player level above 1.
    pub level_scaling: f64,
    /// Creature stat growth per zone tier above 1.
    pub zone_tier_scaling: f64,
    /// Reward growth per rarity step of the creature.
    pub rarity_reward_step: f64,
    /// Share of the base reward unit lost on defeat.
    pub loss_penalty_ratio: f64,
    /// Share of the base reward unit lost when fleeing a battle.
    pub flee_penalty_ratio: f64,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            starting_energy: 100,
            energy_regen: 10,
            energy_on_hit: 5,
            ultimate_gain: 10,
            ultimate_on_hit: 15,
            crit_multiplier: 1.5,
            defend_damage_reduction: 0.5,
            defend_cooldown: 2,
            rage_per_round: 0.1,
            rage_damage_bonus: 0.5,
            empowered_chance: 0.05,
            empowered_stat_bonus: 1.25,
            empowered_reward_bonus: 1.5,
            level_scaling: 0.08,
            zone_tier_scaling: 0.2,
            rarity_reward_step: 0.5,
            loss_penalty_ratio: 0.5,
            flee_penalty_ratio: 0.25,
        }
    }
}

impl CombatTuning {
    /// Checks ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> EconomyResult<()> {
        let probabilities = [
            ("empowered_chance", self.empowered_chance),
            ("defend_damage_reduction", self.defend_damage_reduction),
            ("loss_penalty_ratio", self.loss_penalty_ratio),
            ("flee_penalty_ratio", self.flee_penalty_ratio),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(EconomyError::InvalidConfig(format!(
                    "combat.{name} = {value} outside [0, 1]"
                )));
            }
        }

        let factors = [
            ("crit_multiplier", self.crit_multiplier),
            ("rage_per_round", self.rage_per_round),
            ("rage_damage_bonus", self.rage_damage_bonus),
            ("empowered_stat_bonus", self.empowered_stat_bonus),
            ("empowered_reward_bonus", self.empowered_reward_bonus),
            ("level_scaling", self.level_scaling),
            ("zone_tier_scaling", self.zone_tier_scaling),
            ("rarity_reward_step", self.rarity_reward_step),
        ];
        for (name, value) in factors {
            if !value.is_finite() || value < 0.0 {
                return Err(EconomyError::InvalidConfig(format!(
                    "combat.{name} = {value} must be a non-negative number"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(CombatTuning::default().validate().is_ok());
    }

    #[test]
    fn test_bad_ratio_rejected() {
        let tuning = CombatTuning {
            flee_penalty_ratio: 1.5,
            ..CombatTuning::default()
        };
        assert!(tuning.validate().is_err());
    }
}
