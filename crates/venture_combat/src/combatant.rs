//! # Combatants
//!
//! Derived stats for both sides of a battle.
//!
//! Player stats come from class, level and equipment. Creature stats come from
//! the template, scaled by the player's level and the zone tier, with a small
//! chance of an empowered variant.

use rand::Rng;
use serde::Serialize;
use venture_economy::{
    roll_chance, AbilityDefinition, AbilityId, Catalog, ClassId, CreatureTemplate, ItemId,
    PlayerId, PlayerRecord, Zone,
};

use crate::error::{CombatError, CombatResult};
use crate::status::StatusEffects;
use crate::tuning::CombatTuning;

/// Maximum number of active ability slots.
pub const MAX_LOADOUT_SLOTS: usize = 4;

/// Derived combat stats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CombatStats {
    /// Starting and maximum HP.
    pub max_hp: u32,
    /// Attack.
    pub attack: u32,
    /// Defense.
    pub defense: u32,
    /// Chance to land a critical hit.
    pub crit_chance: f64,
    /// Chance to dodge an incoming attack.
    pub dodge_chance: f64,
}

/// Scaled creature stats, computed at encounter time and reusable at fight time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CreatureStats {
    /// Scaled stats.
    pub stats: CombatStats,
    /// Whether the empowered variant spawned.
    pub empowered: bool,
}

/// What the engine needs to know about the player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerProfile {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Character class.
    pub class_id: ClassId,
    /// Current level.
    pub level: u32,
    /// Cumulative experience.
    pub total_xp: u64,
    /// Equipped items.
    pub equipment: Vec<ItemId>,
    /// Active ability slots.
    pub loadout: Vec<AbilityId>,
    /// Ultimate slot.
    pub ultimate: Option<AbilityId>,
}

impl PlayerProfile {
    /// Builds a profile from a stored record, taking the ultimate from its class.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the record's class is not in the catalog.
    pub fn from_record(record: &PlayerRecord, catalog: &Catalog) -> CombatResult<Self> {
        let class = catalog.class(record.class_id)?;
        Ok(Self {
            player_id: record.id,
            class_id: record.class_id,
            level: record.level,
            total_xp: record.total_xp,
            equipment: record.equipment.clone(),
            loadout: record.loadout.clone(),
            ultimate: Some(class.ultimate),
        })
    }

    /// Derives combat stats from class, level and equipment.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown class or equipped item.
    pub fn derive_stats(&self, catalog: &Catalog) -> CombatResult<CombatStats> {
        let class = catalog.class(self.class_id)?;
        let growth = self.level.saturating_sub(1);

        let mut stats = CombatStats {
            max_hp: class
                .base_hp
                .saturating_add(class.hp_per_level.saturating_mul(growth)),
            attack: class
                .base_attack
                .saturating_add(class.attack_per_level.saturating_mul(growth)),
            defense: class
                .base_defense
                .saturating_add(class.defense_per_level.saturating_mul(growth)),
            crit_chance: class.crit_chance,
            dodge_chance: class.dodge_chance,
        };
        for &item_id in &self.equipment {
            let item = catalog.item(item_id)?;
            stats.max_hp = stats.max_hp.saturating_add(item.hp_bonus);
            stats.attack = stats.attack.saturating_add(item.attack_bonus);
            stats.defense = stats.defense.saturating_add(item.defense_bonus);
        }
        stats.max_hp = stats.max_hp.max(1);
        Ok(stats)
    }
}

/// Resolved ability slots owned by a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Loadout {
    abilities: Vec<AbilityDefinition>,
    ultimate: Option<AbilityDefinition>,
}

impl Loadout {
    /// Resolves and checks a profile's slots.
    ///
    /// # Errors
    ///
    /// - `InvalidAction` for more than four slots, an ultimate in an active
    ///   slot, or a regular ability in the ultimate slot
    /// - `EntityNotFound` for an unknown ability id
    pub fn resolve(catalog: &Catalog, profile: &PlayerProfile) -> CombatResult<Self> {
        if profile.loadout.len() > MAX_LOADOUT_SLOTS {
            return Err(CombatError::InvalidAction(format!(
                "loadout has {} slots, at most {MAX_LOADOUT_SLOTS} allowed",
                profile.loadout.len()
            )));
        }

        let mut abilities = Vec::with_capacity(profile.loadout.len());
        for &id in &profile.loadout {
            let ability = catalog.ability(id)?;
            if ability.ultimate {
                return Err(CombatError::InvalidAction(format!(
                    "ultimate ability {id} cannot sit in an active slot"
                )));
            }
            abilities.push(ability.clone());
        }

        let ultimate = match profile.ultimate {
            Some(id) => {
                let ability = catalog.ability(id)?;
                if !ability.ultimate {
                    return Err(CombatError::InvalidAction(format!(
                        "ability {id} is not an ultimate"
                    )));
                }
                Some(ability.clone())
            }
            None => None,
        };

        Ok(Self { abilities, ultimate })
    }

    /// The equipped ability with `id`, if any.
    #[must_use]
    pub fn ability(&self, id: AbilityId) -> Option<&AbilityDefinition> {
        self.abilities.iter().find(|a| a.id == id)
    }

    /// Active slots in order.
    #[must_use]
    pub fn abilities(&self) -> &[AbilityDefinition] {
        &self.abilities
    }

    /// The ultimate slot.
    #[must_use]
    pub const fn ultimate(&self) -> Option<&AbilityDefinition> {
        self.ultimate.as_ref()
    }
}

/// Scales a creature template to the player's level and the zone tier.
pub fn scale_creature<R: Rng + ?Sized>(
    template: &CreatureTemplate,
    player_level: u32,
    zone: &Zone,
    tuning: &CombatTuning,
    rng: &mut R,
) -> CreatureStats {
    let level_factor = 1.0 + tuning.level_scaling * f64::from(player_level.saturating_sub(1));
    let zone_factor = 1.0 + tuning.zone_tier_scaling * f64::from(zone.tier.saturating_sub(1));
    let scale = level_factor * zone_factor;
    let empowered = roll_chance(rng, tuning.empowered_chance).0;
    let boost = if empowered { tuning.empowered_stat_bonus } else { 1.0 };

    CreatureStats {
        stats: CombatStats {
            max_hp: ((f64::from(template.hp) * scale * boost).floor() as u32).max(1),
            attack: (f64::from(template.attack) * scale * boost).floor() as u32,
            defense: (f64::from(template.defense) * scale).floor() as u32,
            crit_chance: template.crit_chance,
            dodge_chance: template.dodge_chance,
        },
        empowered,
    }
}

/// One side of a battle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Combatant {
    name: String,
    stats: CombatStats,
    hp: u32,
    status: StatusEffects,
}

impl Combatant {
    /// A combatant at full HP with no effects.
    #[must_use]
    pub fn new(name: impl Into<String>, stats: CombatStats) -> Self {
        Self {
            name: name.into(),
            hp: stats.max_hp,
            stats,
            status: StatusEffects::new(),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Derived stats.
    #[must_use]
    pub const fn stats(&self) -> &CombatStats {
        &self.stats
    }

    /// Current HP.
    #[must_use]
    pub const fn hp(&self) -> u32 {
        self.hp
    }

    /// True at 0 HP.
    #[must_use]
    pub const fn is_defeated(&self) -> bool {
        self.hp == 0
    }

    /// Status effects.
    #[must_use]
    pub const fn status(&self) -> &StatusEffects {
        &self.status
    }

    pub(crate) fn status_mut(&mut self) -> &mut StatusEffects {
        &mut self.status
    }

    /// Removes up to `damage` HP, clamped at 0. Returns the HP actually lost.
    pub fn take_damage(&mut self, damage: u32) -> u32 {
        let lost = damage.min(self.hp);
        self.hp -= lost;
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use venture_economy::GameRng;

    fn warrior(level: u32) -> PlayerProfile {
        PlayerProfile {
            player_id: 1,
            class_id: 1,
            level,
            total_xp: 0,
            equipment: Vec::new(),
            loadout: vec![1, 2, 3],
            ultimate: Some(10),
        }
    }

    #[test]
    fn test_player_stats_grow_with_level_and_gear() {
        let catalog = Catalog::builtin().unwrap();
        let base = warrior(1).derive_stats(&catalog).unwrap();
        assert_eq!(base.max_hp, 120);
        assert_eq!(base.attack, 14);

        let mut geared = warrior(3);
        geared.equipment = vec![301, 302];
        let stats = geared.derive_stats(&catalog).unwrap();
        assert_eq!(stats.max_hp, 120 + 24 + 10);
        assert_eq!(stats.attack, 14 + 4 + 6);
        assert_eq!(stats.defense, 8 + 2 + 2);
    }

    #[test]
    fn test_unknown_equipment_is_not_found() {
        let catalog = Catalog::builtin().unwrap();
        let mut profile = warrior(1);
        profile.equipment = vec![9_999];
        assert!(matches!(
            profile.derive_stats(&catalog),
            Err(CombatError::Economy(_))
        ));
    }

    #[test]
    fn test_loadout_limits() {
        let catalog = Catalog::builtin().unwrap();

        let mut crowded = warrior(1);
        crowded.loadout = vec![1, 2, 3, 4, 5];
        assert!(matches!(
            Loadout::resolve(&catalog, &crowded),
            Err(CombatError::InvalidAction(_))
        ));

        let mut wrong_ultimate = warrior(1);
        wrong_ultimate.ultimate = Some(1);
        assert!(matches!(
            Loadout::resolve(&catalog, &wrong_ultimate),
            Err(CombatError::InvalidAction(_))
        ));

        let loadout = Loadout::resolve(&catalog, &warrior(1)).unwrap();
        assert_eq!(loadout.abilities().len(), 3);
        assert_eq!(loadout.ultimate().map(|u| u.id), Some(10));
        assert!(loadout.ability(2).is_some());
        assert!(loadout.ability(4).is_none());
    }

    #[test]
    fn test_creature_scaling() {
        let catalog = Catalog::builtin().unwrap();
        let template = catalog.creature(1).unwrap();
        let zone = catalog.zone(1).unwrap();
        let tuning = CombatTuning {
            empowered_chance: 0.0,
            ..CombatTuning::default()
        };
        let mut rng = GameRng::seed_from_u64(3);

        let level_one = scale_creature(template, 1, zone, &tuning, &mut rng);
        assert_eq!(level_one.stats.max_hp, template.hp);
        assert!(!level_one.empowered);

        let level_ten = scale_creature(template, 10, zone, &tuning, &mut rng);
        assert!(level_ten.stats.max_hp > level_one.stats.max_hp);

        let always = CombatTuning {
            empowered_chance: 1.0,
            ..CombatTuning::default()
        };
        let empowered = scale_creature(template, 1, zone, &always, &mut rng);
        assert!(empowered.empowered);
        assert!(empowered.stats.max_hp > level_one.stats.max_hp);
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let stats = CombatStats {
            max_hp: 30,
            attack: 5,
            defense: 0,
            crit_chance: 0.0,
            dodge_chance: 0.0,
        };
        let mut combatant = Combatant::new("Dummy", stats);
        assert_eq!(combatant.take_damage(20), 20);
        assert_eq!(combatant.take_damage(20), 10);
        assert!(combatant.is_defeated());
    }
}
