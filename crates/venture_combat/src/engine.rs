//! # Combat Engine
//!
//! Session setup and deterministic round resolution.
//!
//! ## Round order
//!
//! 1. Player phase (skipped while stunned)
//! 2. Creature HP check
//! 3. Creature phase (skipped while stunned), scaled by rage
//! 4. Player HP check
//! 5. DoT ticks, creature first
//! 6. Regeneration, cooldowns, rage, round counter
//!
//! Every action is validated against the session before anything changes,
//! so a rejected action leaves the session exactly as it was.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use venture_economy::{
    roll_chance, Catalog, CreatureId, EffectDefinition, GameRng, PlayerId, RewardGenerator,
    SeedDeriver, ZoneId,
};

use crate::action::CombatAction;
use crate::combatant::{scale_creature, CombatStats, Combatant, CreatureStats, Loadout, PlayerProfile};
use crate::error::{CombatError, CombatResult};
use crate::log::{PhaseOutcome, RoundLog, StatusApplied};
use crate::resources::{CooldownKey, CooldownTable, ResourcePools};
use crate::session::{CombatSession, Encounter, SessionState, Victor};
use crate::status::DotTick;
use crate::status::StatusEffects;
use crate::tuning::CombatTuning;

/// Damage after mitigation: `max(1, floor(attack × multiplier × 100/(100+defense) × factor))`.
#[must_use]
pub fn compute_damage(attack: u32, defense: u32, multiplier: f64, factor: f64) -> u32 {
    let mitigation = 100.0 / (100.0 + f64::from(defense));
    let raw = f64::from(attack) * multiplier * mitigation * factor;
    (raw.floor() as u32).max(1)
}

/// A validated player action, ready to apply.
enum Plan {
    Guard,
    Strike {
        multiplier: f64,
        crit_chance: f64,
        effect: Option<EffectDefinition>,
        energy_cost: u32,
        cooldown: Option<(CooldownKey, u32)>,
        ultimate: bool,
    },
}

/// Builds and resolves combat sessions.
pub struct CombatEngine {
    catalog: Arc<Catalog>,
    tuning: CombatTuning,
    seeds: SeedDeriver,
    nonce: AtomicU64,
}

impl CombatEngine {
    /// Creates an engine over a validated catalog.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, tuning: CombatTuning, seeds: SeedDeriver) -> Self {
        Self {
            catalog,
            tuning,
            seeds,
            nonce: AtomicU64::new(0),
        }
    }

    /// The catalog sessions are built from.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Balance parameters.
    #[must_use]
    pub const fn tuning(&self) -> &CombatTuning {
        &self.tuning
    }

    /// A fresh generator for `player_id`, unique per call.
    pub fn next_rng(&self, player_id: PlayerId) -> GameRng {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        self.seeds.rng_for(player_id, nonce)
    }

    /// Scales creature `creature_id` for a player of `player_level` in `zone_id`.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown creature or zone.
    pub fn scale_creature<R: Rng + ?Sized>(
        &self,
        creature_id: CreatureId,
        player_level: u32,
        zone_id: ZoneId,
        rng: &mut R,
    ) -> CombatResult<CreatureStats> {
        let template = self.catalog.creature(creature_id)?;
        let zone = self.catalog.zone(zone_id)?;
        Ok(scale_creature(template, player_level, zone, &self.tuning, rng))
    }

    /// Rolls whether exploring `zone_id` runs into a creature, and scales it.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown zone or creature.
    pub fn roll_encounter<R: Rng + ?Sized>(
        &self,
        profile: &PlayerProfile,
        zone_id: ZoneId,
        rng: &mut R,
    ) -> CombatResult<Option<Encounter>> {
        let Some(creature_id) = RewardGenerator::new(&self.catalog).roll_encounter(zone_id, rng)?
        else {
            return Ok(None);
        };
        let template = self.catalog.creature(creature_id)?;
        let stats = self.scale_creature(creature_id, profile.level, zone_id, rng)?;

        tracing::debug!(
            "Player {} encountered {} in zone {} (empowered: {})",
            profile.player_id,
            template.name,
            zone_id,
            stats.empowered
        );

        Ok(Some(Encounter {
            player_id: profile.player_id,
            zone_id,
            creature_id,
            creature_name: template.name.clone(),
            rarity: template.rarity,
            stats,
        }))
    }

    /// Starts a battle with a generator derived from the server secret.
    ///
    /// # Errors
    ///
    /// See [`CombatEngine::initialize_session_with_rng`].
    pub fn initialize_session(
        &self,
        profile: &PlayerProfile,
        zone_id: ZoneId,
        creature_id: CreatureId,
        precomputed: Option<CreatureStats>,
    ) -> CombatResult<CombatSession> {
        let rng = self.next_rng(profile.player_id);
        self.initialize_session_with_rng(profile, zone_id, creature_id, precomputed, rng)
    }

    /// Starts a battle driven by `rng`.
    ///
    /// Creature stats are scaled now unless `precomputed` carries the ones
    /// rolled at encounter time.
    ///
    /// # Errors
    ///
    /// - `EntityNotFound` for an unknown creature, zone, class, item or ability
    /// - `InvalidAction` for an illegal loadout
    pub fn initialize_session_with_rng(
        &self,
        profile: &PlayerProfile,
        zone_id: ZoneId,
        creature_id: CreatureId,
        precomputed: Option<CreatureStats>,
        mut rng: GameRng,
    ) -> CombatResult<CombatSession> {
        let template = self.catalog.creature(creature_id)?;
        let zone = self.catalog.zone(zone_id)?;
        let player_stats = profile.derive_stats(&self.catalog)?;
        let loadout = Loadout::resolve(&self.catalog, profile)?;
        let creature_stats = match precomputed {
            Some(stats) => stats,
            None => scale_creature(template, profile.level, zone, &self.tuning, &mut rng),
        };

        tracing::info!(
            "Combat started: player {} vs {} (hp {}, atk {}, def {}, empowered: {})",
            profile.player_id,
            template.name,
            creature_stats.stats.max_hp,
            creature_stats.stats.attack,
            creature_stats.stats.defense,
            creature_stats.empowered
        );

        Ok(CombatSession {
            player_id: profile.player_id,
            zone_id,
            creature_id,
            creature_rarity: template.rarity,
            empowered: creature_stats.empowered,
            creature_on_hit: template.on_hit,
            player_level: profile.level,
            player_total_xp: profile.total_xp,
            player: Combatant::new(format!("player-{}", profile.player_id), player_stats),
            creature: Combatant::new(template.name.clone(), creature_stats.stats),
            loadout,
            resources: ResourcePools::new(self.tuning.starting_energy),
            cooldowns: CooldownTable::new(),
            guard_up: false,
            round: 1,
            log: Vec::new(),
            state: SessionState::Active,
            retired: false,
            rng,
        })
    }

    /// Resolves one round and returns its log entry.
    ///
    /// # Errors
    ///
    /// - `StateConflict` if the session is no longer active
    /// - `InvalidAction` if the action is not equipped, on cooldown,
    ///   unaffordable, or an ultimate without a full gauge
    pub fn resolve_action(
        &self,
        session: &mut CombatSession,
        action: CombatAction,
    ) -> CombatResult<RoundLog> {
        if session.retired || !session.is_active() {
            return Err(CombatError::StateConflict(format!(
                "combat for player {} is already over",
                session.player_id
            )));
        }
        let plan = Self::plan(session, action)?;

        // Phase 1: player
        let player_phase = if session.player.status().is_stunned() {
            session.player.status_mut().consume_stun();
            PhaseOutcome::Stunned
        } else {
            self.apply_plan(session, plan)
        };

        // Phases 2-4: creature
        let creature_phase = if session.creature.is_defeated() {
            session.state = SessionState::Complete(Victor::Player);
            PhaseOutcome::Skipped
        } else if session.creature.status().is_stunned() {
            session.creature.status_mut().consume_stun();
            PhaseOutcome::Stunned
        } else {
            let outcome = self.creature_strike(session);
            if session.player.is_defeated() {
                session.state = SessionState::Complete(Victor::Creature);
            }
            outcome
        };

        // Phase 5: damage over time
        let mut creature_ticks = Vec::new();
        let mut player_ticks = Vec::new();
        if session.is_active() {
            creature_ticks = session.creature.status_mut().tick_dots();
            let damage = dot_damage(&creature_ticks);
            session.creature.take_damage(damage);
            if session.creature.is_defeated() {
                session.state = SessionState::Complete(Victor::Player);
            }
        }
        if session.is_active() {
            player_ticks = session.player.status_mut().tick_dots();
            let damage = dot_damage(&player_ticks);
            session.player.take_damage(damage);
            if session.player.is_defeated() {
                session.state = SessionState::Complete(Victor::Creature);
            }
        }

        // Phase 6: upkeep
        if session.is_active() {
            let landed = player_phase.is_hit();
            let energy_bonus = if landed { self.tuning.energy_on_hit } else { 0 };
            let charge_bonus = if landed { self.tuning.ultimate_on_hit } else { 0 };
            session
                .resources
                .gain_energy(self.tuning.energy_regen.saturating_add(energy_bonus));
            session
                .resources
                .gain_ultimate(self.tuning.ultimate_gain.saturating_add(charge_bonus));
            session.cooldowns.tick();
            session
                .creature
                .status_mut()
                .build_rage(self.tuning.rage_per_round);
        }

        let entry = RoundLog {
            round: session.round,
            action,
            player_phase,
            creature_phase,
            creature_ticks,
            player_ticks,
            player_hp: session.player.hp(),
            creature_hp: session.creature.hp(),
            energy: session.resources.energy(),
            ultimate_charge: session.resources.ultimate_charge(),
            rage: session.creature.status().rage(),
            state: session.state,
        };
        session.log.push(entry.clone());

        if session.is_active() {
            session.round += 1;
            tracing::debug!(
                "Player {} round {} resolved: {} -> player hp {}, creature hp {}",
                session.player_id,
                entry.round,
                action,
                entry.player_hp,
                entry.creature_hp
            );
        } else {
            tracing::info!(
                "Combat over for player {} after {} rounds: {:?}",
                session.player_id,
                entry.round,
                session.state
            );
        }

        Ok(entry)
    }

    /// Checks `action` against the session without changing it.
    fn plan(session: &CombatSession, action: CombatAction) -> CombatResult<Plan> {
        let crit_chance = session.player.stats().crit_chance;
        match action {
            CombatAction::Attack => Ok(Plan::Strike {
                multiplier: 1.0,
                crit_chance,
                effect: None,
                energy_cost: 0,
                cooldown: None,
                ultimate: false,
            }),
            CombatAction::Defend => {
                ensure_ready(&session.cooldowns, CooldownKey::Defend, "defend")?;
                Ok(Plan::Guard)
            }
            CombatAction::Ability(id) => {
                let ability = session.loadout.ability(id).ok_or_else(|| {
                    CombatError::InvalidAction(format!("ability {id} is not equipped"))
                })?;
                let key = CooldownKey::Ability(id);
                ensure_ready(&session.cooldowns, key, &ability.name)?;
                if !session.resources.can_afford(ability.energy_cost) {
                    return Err(CombatError::InvalidAction(format!(
                        "{} needs {} energy, {} available",
                        ability.name,
                        ability.energy_cost,
                        session.resources.energy()
                    )));
                }
                Ok(Plan::Strike {
                    multiplier: ability.multiplier,
                    crit_chance: crit_chance + ability.crit_bonus,
                    effect: ability.effect,
                    energy_cost: ability.energy_cost,
                    cooldown: Some((key, ability.cooldown)),
                    ultimate: false,
                })
            }
            CombatAction::Ultimate => {
                let ability = session.loadout.ultimate().ok_or_else(|| {
                    CombatError::InvalidAction("no ultimate equipped".to_string())
                })?;
                if !session.resources.ultimate_ready() {
                    return Err(CombatError::InvalidAction(format!(
                        "ultimate charge at {}/100",
                        session.resources.ultimate_charge()
                    )));
                }
                Ok(Plan::Strike {
                    multiplier: ability.multiplier,
                    crit_chance: crit_chance + ability.crit_bonus,
                    effect: ability.effect,
                    energy_cost: 0,
                    cooldown: None,
                    ultimate: true,
                })
            }
        }
    }

    fn apply_plan(&self, session: &mut CombatSession, plan: Plan) -> PhaseOutcome {
        match plan {
            Plan::Guard => {
                session.guard_up = true;
                session
                    .cooldowns
                    .start(CooldownKey::Defend, self.tuning.defend_cooldown);
                PhaseOutcome::Guarded
            }
            Plan::Strike {
                multiplier,
                crit_chance,
                effect,
                energy_cost,
                cooldown,
                ultimate,
            } => {
                session.resources.try_spend_energy(energy_cost);
                if let Some((key, rounds)) = cooldown {
                    session.cooldowns.start(key, rounds);
                }
                if ultimate {
                    session.resources.consume_ultimate();
                }

                let attacker = *session.player.stats();
                let defender = *session.creature.stats();
                let strike = self.strike(
                    &mut session.rng,
                    &attacker,
                    &defender,
                    multiplier,
                    crit_chance,
                    1.0,
                );
                match strike {
                    Strike::Dodged { dodge_roll } => PhaseOutcome::Dodged { dodge_roll },
                    Strike::Landed {
                        damage,
                        critical,
                        dodge_roll,
                        crit_roll,
                    } => {
                        session.creature.take_damage(damage);
                        let (effect_roll, inflicted) = effect.map_or((None, None), |effect| {
                            inflict(
                                &effect,
                                attacker.attack,
                                session.creature.status_mut(),
                                &mut session.rng,
                            )
                        });
                        PhaseOutcome::Hit {
                            damage,
                            critical,
                            guarded: false,
                            dodge_roll,
                            crit_roll,
                            effect_roll,
                            inflicted,
                        }
                    }
                }
            }
        }
    }

    fn creature_strike(&self, session: &mut CombatSession) -> PhaseOutcome {
        let attacker = *session.creature.stats();
        let defender = *session.player.stats();
        let rage_factor = 1.0 + session.creature.status().rage() * self.tuning.rage_damage_bonus;
        let guard_factor = if session.guard_up {
            self.tuning.defend_damage_reduction
        } else {
            1.0
        };

        match self.strike(
            &mut session.rng,
            &attacker,
            &defender,
            1.0,
            attacker.crit_chance,
            rage_factor * guard_factor,
        ) {
            Strike::Dodged { dodge_roll } => PhaseOutcome::Dodged { dodge_roll },
            Strike::Landed {
                damage,
                critical,
                dodge_roll,
                crit_roll,
            } => {
                let guarded = std::mem::replace(&mut session.guard_up, false);
                session.player.take_damage(damage);
                let (effect_roll, inflicted) =
                    session.creature_on_hit.map_or((None, None), |effect| {
                        inflict(
                            &effect,
                            attacker.attack,
                            session.player.status_mut(),
                            &mut session.rng,
                        )
                    });
                PhaseOutcome::Hit {
                    damage,
                    critical,
                    guarded,
                    dodge_roll,
                    crit_roll,
                    effect_roll,
                    inflicted,
                }
            }
        }
    }

    /// Dodge roll, then crit roll, then damage.
    fn strike(
        &self,
        rng: &mut GameRng,
        attacker: &CombatStats,
        defender: &CombatStats,
        multiplier: f64,
        crit_chance: f64,
        factor: f64,
    ) -> Strike {
        let (dodged, dodge_roll) = roll_chance(rng, defender.dodge_chance);
        if dodged {
            return Strike::Dodged { dodge_roll };
        }
        let (critical, crit_roll) = roll_chance(rng, crit_chance);
        let crit_factor = if critical {
            self.tuning.crit_multiplier
        } else {
            1.0
        };
        Strike::Landed {
            damage: compute_damage(
                attacker.attack,
                defender.defense,
                multiplier,
                crit_factor * factor,
            ),
            critical,
            dodge_roll,
            crit_roll,
        }
    }
}

impl std::fmt::Debug for CombatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatEngine")
            .field("tuning", &self.tuning)
            .field("seeds", &self.seeds)
            .field("nonce", &self.nonce.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

enum Strike {
    Dodged {
        dodge_roll: f64,
    },
    Landed {
        damage: u32,
        critical: bool,
        dodge_roll: f64,
        crit_roll: f64,
    },
}

fn ensure_ready(cooldowns: &CooldownTable, key: CooldownKey, name: &str) -> CombatResult<()> {
    let remaining = cooldowns.remaining(key);
    if remaining > 0 {
        return Err(CombatError::InvalidAction(format!(
            "{name} is on cooldown for {remaining} more rounds"
        )));
    }
    Ok(())
}

/// Rolls `effect` and applies it to `target` on success.
fn inflict(
    effect: &EffectDefinition,
    source_attack: u32,
    target: &mut StatusEffects,
    rng: &mut GameRng,
) -> (Option<f64>, Option<StatusApplied>) {
    let (landed, roll) = roll_chance(rng, effect.chance());
    if !landed {
        return (Some(roll), None);
    }
    let applied = match *effect {
        EffectDefinition::Stun { rounds, .. } => {
            target.apply_stun(rounds);
            StatusApplied::Stun { rounds }
        }
        EffectDefinition::DamageOverTime {
            dot, ticks, power, ..
        } => {
            let per_tick = ((f64::from(source_attack) * power).floor() as u32).max(1);
            target.apply_dot(dot, ticks, per_tick);
            StatusApplied::DamageOverTime {
                dot,
                ticks,
                per_tick,
            }
        }
    };
    (Some(roll), Some(applied))
}

fn dot_damage(ticks: &[DotTick]) -> u32 {
    ticks.iter().fold(0u32, |total, tick| total.saturating_add(tick.damage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use venture_economy::DotKind;

    fn arena() -> CombatEngine {
        let catalog = Catalog::from_toml_str(include_str!("../tests/data/arena.toml")).unwrap();
        let tuning = CombatTuning {
            empowered_chance: 0.0,
            ..CombatTuning::default()
        };
        CombatEngine::new(Arc::new(catalog), tuning, SeedDeriver::test_seed())
    }

    fn squire() -> PlayerProfile {
        PlayerProfile {
            player_id: 7,
            class_id: 1,
            level: 1,
            total_xp: 0,
            equipment: Vec::new(),
            loadout: vec![1, 2, 3],
            ultimate: Some(9),
        }
    }

    fn session_against(engine: &CombatEngine, creature_id: CreatureId) -> CombatSession {
        engine
            .initialize_session_with_rng(&squire(), 1, creature_id, None, GameRng::seed_from_u64(42))
            .unwrap()
    }

    #[test]
    fn test_damage_formula() {
        assert_eq!(compute_damage(20, 0, 1.0, 1.0), 20);
        assert_eq!(compute_damage(10, 5, 1.0, 1.0), 9);
        assert_eq!(compute_damage(1, 500, 1.0, 1.0), 1);
        assert_eq!(compute_damage(20, 0, 2.0, 1.5), 60);
    }

    #[test]
    fn test_session_starts_fresh() {
        let engine = arena();
        let session = session_against(&engine, 1);

        assert_eq!(session.round(), 1);
        assert!(session.log().is_empty());
        assert!(session.is_active());
        assert!(!session.player_won());
        assert!(!session.beast_won());
        assert_eq!(session.resources().energy(), 100);
        assert_eq!(session.resources().ultimate_charge(), 0);
        assert_eq!(session.cooldowns().active().count(), 0);
        assert_eq!(session.creature().hp(), 100);
    }

    #[test]
    fn test_unknown_creature_is_not_found() {
        let engine = arena();
        let result = engine.initialize_session(&squire(), 1, 99, None);
        assert!(matches!(result, Err(CombatError::Economy(_))));
    }

    #[test]
    fn test_basic_attack_round() {
        let engine = arena();
        let mut session = session_against(&engine, 1);

        let entry = engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();

        assert_eq!(entry.player_phase.damage(), 20);
        assert_eq!(session.creature().hp(), 80);
        // 10 * 100/105, no rage yet
        assert_eq!(entry.creature_phase.damage(), 9);
        assert_eq!(session.player().hp(), 91);
        assert_eq!(session.resources().energy(), 100);
        assert_eq!(session.resources().ultimate_charge(), 25);
        assert_eq!(session.round(), 2);
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn test_ability_costs_energy_and_cools_down() {
        let engine = arena();
        let mut session = session_against(&engine, 1);

        let entry = engine
            .resolve_action(&mut session, CombatAction::Ability(1))
            .unwrap();
        assert_eq!(entry.player_phase.damage(), 40);
        assert_eq!(session.resources().energy(), 100 - 40 + 10 + 5);

        let before = session.clone();
        let again = engine.resolve_action(&mut session, CombatAction::Ability(1));
        assert!(matches!(again, Err(CombatError::InvalidAction(_))));
        assert_eq!(session.round(), before.round());
        assert_eq!(session.log().len(), before.log().len());
        assert_eq!(session.resources(), before.resources());

        engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();
        assert!(engine
            .resolve_action(&mut session, CombatAction::Ability(1))
            .is_ok());
    }

    #[test]
    fn test_unequipped_ability_rejected() {
        let engine = arena();
        let mut session = session_against(&engine, 1);
        assert!(matches!(
            engine.resolve_action(&mut session, CombatAction::Ability(9)),
            Err(CombatError::InvalidAction(_))
        ));
        assert!(matches!(
            engine.resolve_action(&mut session, CombatAction::Ability(42)),
            Err(CombatError::InvalidAction(_))
        ));
        assert!(session.log().is_empty());
    }

    #[test]
    fn test_ultimate_needs_full_charge() {
        let engine = arena();
        let mut session = session_against(&engine, 1);

        assert!(matches!(
            engine.resolve_action(&mut session, CombatAction::Ultimate),
            Err(CombatError::InvalidAction(_))
        ));
        assert!(session.log().is_empty());

        for _ in 0..4 {
            engine
                .resolve_action(&mut session, CombatAction::Attack)
                .unwrap();
        }
        assert!(session.resources().ultimate_ready());
        assert_eq!(session.creature().hp(), 20);

        let entry = engine
            .resolve_action(&mut session, CombatAction::Ultimate)
            .unwrap();
        assert_eq!(entry.player_phase.damage(), 60);
        assert_eq!(session.resources().ultimate_charge(), 0);
        assert!(session.player_won());
        assert_eq!(entry.creature_phase, PhaseOutcome::Skipped);
    }

    #[test]
    fn test_stun_blocks_creature_once() {
        let engine = arena();
        let mut session = session_against(&engine, 1);

        let stunned = engine
            .resolve_action(&mut session, CombatAction::Ability(2))
            .unwrap();
        assert_eq!(stunned.creature_phase, PhaseOutcome::Stunned);
        assert_eq!(session.player().hp(), 100);

        let next = engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();
        assert!(next.creature_phase.is_hit());
    }

    #[test]
    fn test_dot_ticks_after_phases() {
        let engine = arena();
        let mut session = session_against(&engine, 1);

        let first = engine
            .resolve_action(&mut session, CombatAction::Ability(3))
            .unwrap();
        assert_eq!(first.creature_ticks.len(), 1);
        assert_eq!(first.creature_ticks[0].damage, 10);
        assert_eq!(session.creature().hp(), 70);

        engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();
        assert_eq!(session.creature().hp(), 40);

        let third = engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();
        assert!(third.creature_ticks.is_empty());
        assert_eq!(session.creature().hp(), 20);
    }

    #[test]
    fn test_stacked_dots_saturate() {
        let engine = arena();
        let mut session = session_against(&engine, 1);
        let status = session.creature.status_mut();
        status.apply_dot(DotKind::Bleed, 2, u32::MAX);
        status.apply_dot(DotKind::Poison, 2, u32::MAX);

        let entry = engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();
        assert_eq!(entry.creature_ticks.len(), 2);
        assert_eq!(session.creature().hp(), 0);
        assert!(!session.is_active());
        assert_eq!(dot_damage(&entry.creature_ticks), u32::MAX);
    }

    #[test]
    fn test_defend_reduces_next_hit() {
        let engine = arena();
        let mut session = session_against(&engine, 1);

        let entry = engine
            .resolve_action(&mut session, CombatAction::Defend)
            .unwrap();
        assert_eq!(entry.player_phase, PhaseOutcome::Guarded);
        assert_eq!(session.creature().hp(), 100);
        assert!(matches!(
            entry.creature_phase,
            PhaseOutcome::Hit { damage: 4, guarded: true, .. }
        ));
        assert!(!session.guard_up());

        assert!(matches!(
            engine.resolve_action(&mut session, CombatAction::Defend),
            Err(CombatError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_creature_victory_freezes_upkeep() {
        let engine = arena();
        let mut session = session_against(&engine, 3);

        let entry = engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();
        assert!(session.beast_won());
        assert!(!session.player_won());
        assert_eq!(session.player().hp(), 0);
        assert_eq!(entry.state, SessionState::Complete(Victor::Creature));
        assert_eq!(session.round(), 1);
        assert_eq!(session.log().len(), 1);
        assert_eq!(session.resources().ultimate_charge(), 0);

        assert!(matches!(
            engine.resolve_action(&mut session, CombatAction::Attack),
            Err(CombatError::StateConflict(_))
        ));
    }

    #[test]
    fn test_player_victory_skips_creature() {
        let engine = arena();
        let mut session = session_against(&engine, 2);

        let entry = engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();
        assert!(session.player_won());
        assert_eq!(entry.creature_phase, PhaseOutcome::Skipped);
        assert_eq!(session.player().hp(), 100);
    }

    #[test]
    fn test_precomputed_stats_are_used() {
        let engine = arena();
        let mut rng = GameRng::seed_from_u64(1);
        let mut stats = engine.scale_creature(1, 1, 1, &mut rng).unwrap();
        stats.stats.max_hp = 55;

        let session = engine
            .initialize_session(&squire(), 1, 1, Some(stats))
            .unwrap();
        assert_eq!(session.creature().hp(), 55);
    }

    #[test]
    fn test_encounter_rolls_in_zone() {
        let engine = arena();
        let mut rng = GameRng::seed_from_u64(9);
        let encounter = engine.roll_encounter(&squire(), 1, &mut rng).unwrap();
        let encounter = encounter.expect("encounter chance is 1.0");
        assert!([1, 2, 3].contains(&encounter.creature_id));

        assert!(engine.roll_encounter(&squire(), 2, &mut rng).unwrap().is_none());
    }
}
