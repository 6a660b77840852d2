//! # Expedition
//!
//! The caller-facing flow:
//!
//! ```text
//! explore ──► rewards applied ──► encounter? ──no──► done
//!                                    │
//!                          decline ◄─┴─► fight ──► act* ──► settled
//!                        (no penalty)         └── flee ──► settled
//! ```
//!
//! Battle outcomes are persisted inside the player's session lock. If the
//! store rejects an outcome the session is restored, so the battle can be
//! settled again later.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use venture_combat::{
    CombatAction, CombatEngine, CombatError, CombatResult, CombatSession, Encounter,
    PlayerProfile, RewardResult, RoundLog, SessionRegistry,
};
use venture_economy::{
    apply_rewards, Catalog, CraftResult, CraftingBench, ExplorationRoll, LevelProgress,
    Persistence, PlayerId, PlayerRecord, ProgressionCurve, RecipeId, RewardDelta,
    RewardGenerator, SeedDeriver, ZoneId,
};

use crate::config::{RewardSettings, VentureConfig};
use crate::error::{VentureError, VentureResult};

/// What one exploration produced.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplorationReport {
    /// Zone explored.
    pub zone_id: ZoneId,
    /// Items, chest and chest item.
    pub roll: ExplorationRoll,
    /// Experience granted.
    pub xp_gained: u64,
    /// Level before the exploration.
    pub level_before: u32,
    /// Level after the exploration.
    pub level_after: u32,
    /// Player state after rewards.
    pub record: PlayerRecord,
    /// Creature met, if any. Pending until fought or declined.
    pub encounter: Option<Encounter>,
}

/// A battle result and the player state it produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Reward or penalty.
    pub reward: RewardResult,
    /// Player state after applying it.
    pub record: PlayerRecord,
}

/// One resolved round, with the settlement if the battle ended.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionReport {
    /// The round.
    pub round: RoundLog,
    /// Present once the battle is over.
    pub settlement: Option<Settlement>,
}

/// Exploration, combat and crafting over one store.
pub struct Expedition<P: Persistence> {
    catalog: Arc<Catalog>,
    store: Arc<P>,
    engine: CombatEngine,
    registry: SessionRegistry,
    rewards: RewardSettings,
    encounters: Mutex<HashMap<PlayerId, Encounter>>,
}

impl<P: Persistence> Expedition<P> {
    /// Wires an expedition from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration fails validation.
    pub fn new(
        config: &VentureConfig,
        catalog: Arc<Catalog>,
        store: Arc<P>,
        seeds: SeedDeriver,
    ) -> VentureResult<Self> {
        config.validate()?;
        Ok(Self {
            engine: CombatEngine::new(Arc::clone(&catalog), config.combat.clone(), seeds),
            registry: SessionRegistry::new(config.sessions),
            rewards: config.rewards.clone(),
            catalog,
            store,
            encounters: Mutex::new(HashMap::new()),
        })
    }

    /// The shared catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &P {
        &self.store
    }

    /// The combat engine.
    #[must_use]
    pub const fn engine(&self) -> &CombatEngine {
        &self.engine
    }

    /// Explores the player's current zone.
    ///
    /// Found items, chest coins and exploration XP land as one atomic reward.
    /// A rolled encounter replaces any earlier pending one.
    ///
    /// # Errors
    ///
    /// - `StateConflict` while the player is in a battle
    /// - `EntityNotFound` for an unknown player or zone
    pub fn explore(
        &self,
        player_id: PlayerId,
        map_multiplier: Option<f64>,
    ) -> VentureResult<ExplorationReport> {
        if self.registry.contains(player_id) {
            return Err(CombatError::StateConflict(format!(
                "player {player_id} must finish the current battle first"
            ))
            .into());
        }

        let record = self.store.get_player(player_id)?;
        let zone = self.catalog.zone(record.zone_id)?;
        let multiplier = map_multiplier.unwrap_or(self.rewards.default_map_multiplier);
        let mut rng = self.engine.next_rng(player_id);

        let roll = RewardGenerator::new(&self.catalog).roll_exploration(zone.id, multiplier, &mut rng)?;
        let curve = ProgressionCurve::for_zone(zone);
        let xp_gained = curve.exploration_xp_reward(record.level, &mut rng);
        let updated = apply_rewards(self.store.as_ref(), player_id, &roll, xp_gained, &curve)?;

        let profile = PlayerProfile::from_record(&updated, &self.catalog)?;
        let encounter = self.engine.roll_encounter(&profile, zone.id, &mut rng)?;
        {
            let mut pending = self.encounters.lock();
            match &encounter {
                Some(found) => pending.insert(player_id, found.clone()),
                None => pending.remove(&player_id),
            };
        }

        tracing::info!(
            "Player {} explored {}: {} items, chest: {}, {} xp, encounter: {}",
            player_id,
            zone.name,
            roll.found_items.len(),
            roll.chest.is_some(),
            xp_gained,
            encounter.as_ref().map_or("none", |e| e.creature_name.as_str())
        );

        Ok(ExplorationReport {
            zone_id: zone.id,
            roll,
            xp_gained,
            level_before: record.level,
            level_after: updated.level,
            record: updated,
            encounter,
        })
    }

    /// The player's pending encounter.
    #[must_use]
    pub fn pending_encounter(&self, player_id: PlayerId) -> Option<Encounter> {
        self.encounters.lock().get(&player_id).cloned()
    }

    /// Walks away from the pending encounter. No penalty.
    ///
    /// # Errors
    ///
    /// Returns `StateConflict` if nothing is pending.
    pub fn decline(&self, player_id: PlayerId) -> VentureResult<Encounter> {
        let encounter = self
            .encounters
            .lock()
            .remove(&player_id)
            .ok_or_else(|| no_encounter(player_id))?;
        tracing::info!(
            "Player {} declined to fight {}",
            player_id,
            encounter.creature_name
        );
        Ok(encounter)
    }

    /// Starts a battle against the pending encounter.
    ///
    /// Returns a snapshot of the new session.
    ///
    /// # Errors
    ///
    /// - `StateConflict` if nothing is pending or a battle is already running
    /// - `EntityNotFound` / `InvalidAction` from session setup
    pub fn fight(&self, player_id: PlayerId) -> VentureResult<CombatSession> {
        let encounter = self
            .pending_encounter(player_id)
            .ok_or_else(|| no_encounter(player_id))?;

        let record = self.store.get_player(player_id)?;
        let profile = PlayerProfile::from_record(&record, &self.catalog)?;
        let session = self.engine.initialize_session(
            &profile,
            encounter.zone_id,
            encounter.creature_id,
            Some(encounter.stats),
        )?;
        let snapshot = session.clone();
        self.registry.open(session)?;
        self.encounters.lock().remove(&player_id);
        Ok(snapshot)
    }

    /// Resolves one round. Settles the battle when it ends.
    ///
    /// # Errors
    ///
    /// - `NoActiveSession` without a running battle
    /// - `InvalidAction` / `StateConflict` from round resolution
    /// - store errors while settling; the battle stays open in that case
    pub fn act(&self, player_id: PlayerId, action: CombatAction) -> VentureResult<ActionReport> {
        let unit = self.rewards.base_reward_unit;
        let report = self.registry.with_session(player_id, |session| {
            let round = self.engine.resolve_action(session, action)?;
            if session.is_active() {
                return Ok(ActionReport {
                    round,
                    settlement: None,
                });
            }
            let settlement = self.settle_with(session, |engine, s| engine.apply_outcome(s, unit))?;
            Ok(ActionReport {
                round,
                settlement: Some(settlement),
            })
        })?;
        Ok(report)
    }

    /// Parses `action` and resolves one round.
    ///
    /// # Errors
    ///
    /// `InvalidAction` for an unknown identifier, otherwise as [`Expedition::act`].
    pub fn act_str(&self, player_id: PlayerId, action: &str) -> VentureResult<ActionReport> {
        let action: CombatAction = action.parse()?;
        self.act(player_id, action)
    }

    /// Settles a finished battle whose earlier settlement failed.
    ///
    /// # Errors
    ///
    /// - `NoActiveSession` without an open battle
    /// - `StateConflict` if the battle is still running
    pub fn settle(&self, player_id: PlayerId) -> VentureResult<Settlement> {
        let unit = self.rewards.base_reward_unit;
        let settlement = self.registry.with_session(player_id, |session| {
            self.settle_with(session, |engine, s| engine.apply_outcome(s, unit))
        })?;
        Ok(settlement)
    }

    /// Flees a running battle and pays the flee penalty.
    ///
    /// # Errors
    ///
    /// - `NoActiveSession` without a running battle
    /// - `StateConflict` if the battle already ended
    pub fn flee(&self, player_id: PlayerId) -> VentureResult<Settlement> {
        let unit = self.rewards.base_reward_unit;
        let settlement = self.registry.with_session(player_id, |session| {
            self.settle_with(session, |engine, s| engine.flee(s, unit))
        })?;
        Ok(settlement)
    }

    /// A copy of the player's open battle.
    #[must_use]
    pub fn active_session(&self, player_id: PlayerId) -> Option<CombatSession> {
        self.registry.snapshot(player_id)
    }

    /// Settles every battle idle past the configured timeout.
    ///
    /// A battle whose settlement the store refuses is logged and stays open;
    /// the next sweep tries it again.
    pub fn sweep_idle(&self, now: Instant) -> Vec<Settlement> {
        let unit = self.rewards.base_reward_unit;
        let outcome = self.registry.policy().idle_outcome;

        self.registry
            .sweep_idle(now, |session| {
                self.settle_with(session, |engine, s| engine.expire(s, unit, outcome))
            })
            .into_iter()
            .filter_map(|(player_id, settled)| match settled {
                Ok(settlement) => Some(settlement),
                Err(err) => {
                    tracing::warn!(
                        "Could not settle idle battle for player {}: {}",
                        player_id,
                        err
                    );
                    None
                }
            })
            .collect()
    }

    /// Level band progress in the player's current zone.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown player or zone.
    pub fn level_progress(&self, player_id: PlayerId) -> VentureResult<LevelProgress> {
        let record = self.store.get_player(player_id)?;
        let zone = self.catalog.zone(record.zone_id)?;
        Ok(ProgressionCurve::for_zone(zone).level_progress(record.total_xp))
    }

    /// Whether the player can craft `recipe_id` right now.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown player or recipe.
    pub fn can_craft(&self, player_id: PlayerId, recipe_id: RecipeId) -> VentureResult<bool> {
        Ok(CraftingBench::new(&self.catalog, self.store.as_ref()).can_craft(player_id, recipe_id)?)
    }

    /// Crafts `recipe_id` atomically.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` or `InsufficientResources`; nothing changes on error.
    pub fn craft(&self, player_id: PlayerId, recipe_id: RecipeId) -> VentureResult<CraftResult> {
        Ok(CraftingBench::new(&self.catalog, self.store.as_ref()).craft(player_id, recipe_id)?)
    }

    /// Computes an outcome with `outcome` and persists it, restoring the
    /// session if the store refuses.
    ///
    /// The stored level is derived from the stored XP inside the write, and
    /// the reported `level_after` is taken from the persisted record.
    fn settle_with(
        &self,
        session: &mut CombatSession,
        outcome: impl FnOnce(&CombatEngine, &mut CombatSession) -> CombatResult<RewardResult>,
    ) -> CombatResult<Settlement> {
        let curve = ProgressionCurve::for_zone(self.catalog.zone(session.zone_id())?);
        let snapshot = session.clone();
        let mut reward = outcome(&self.engine, session)?;
        let delta = RewardDelta {
            level_after: None,
            ..reward.to_delta()
        };
        match self.store.apply_progress_atomic(reward.player_id, &delta, &curve) {
            Ok(record) => {
                reward.level_after = record.level;
                if reward.levelled_up() {
                    tracing::info!(
                        "Player {} reached level {}",
                        reward.player_id,
                        reward.level_after
                    );
                }
                Ok(Settlement { reward, record })
            }
            Err(err) => {
                *session = snapshot;
                Err(err.into())
            }
        }
    }
}

impl<P: Persistence> std::fmt::Debug for Expedition<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expedition")
            .field("engine", &self.engine)
            .field("registry", &self.registry)
            .field("rewards", &self.rewards)
            .finish_non_exhaustive()
    }
}

fn no_encounter(player_id: PlayerId) -> VentureError {
    CombatError::StateConflict(format!("player {player_id} has no pending encounter")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_combat::BattleOutcome;
    use venture_economy::MemoryStore;

    use crate::error::ErrorKind;

    /// A store whose rewards can be switched off.
    struct FlakyStore {
        inner: MemoryStore,
        refuse: std::sync::atomic::AtomicBool,
    }

    impl Persistence for FlakyStore {
        fn get_player(&self, id: PlayerId) -> venture_economy::EconomyResult<PlayerRecord> {
            self.inner.get_player(id)
        }

        fn apply_reward_atomic(
            &self,
            id: PlayerId,
            delta: &RewardDelta,
        ) -> venture_economy::EconomyResult<PlayerRecord> {
            if self.refuse.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(venture_economy::EconomyError::Ledger("offline".into()));
            }
            self.inner.apply_reward_atomic(id, delta)
        }

        fn apply_progress_atomic(
            &self,
            id: PlayerId,
            delta: &RewardDelta,
            curve: &ProgressionCurve,
        ) -> venture_economy::EconomyResult<PlayerRecord> {
            if self.refuse.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(venture_economy::EconomyError::Ledger("offline".into()));
            }
            self.inner.apply_progress_atomic(id, delta, curve)
        }

        fn apply_craft_atomic(
            &self,
            id: PlayerId,
            delta: &venture_economy::CraftDelta,
        ) -> venture_economy::EconomyResult<PlayerRecord> {
            self.inner.apply_craft_atomic(id, delta)
        }
    }

    fn expedition_with<P: Persistence>(store: Arc<P>) -> Expedition<P> {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let config = VentureConfig {
            combat: venture_combat::CombatTuning {
                empowered_chance: 0.0,
                ..Default::default()
            },
            ..VentureConfig::default()
        };
        Expedition::new(&config, catalog, store, SeedDeriver::test_seed()).unwrap()
    }

    fn new_player(catalog: &Catalog, id: PlayerId) -> PlayerRecord {
        PlayerRecord::new(id, "Rook", catalog.class(1).unwrap(), 1).with_currency(100)
    }

    /// Explores until a creature shows up.
    fn find_encounter<P: Persistence>(expedition: &Expedition<P>, id: PlayerId) -> Encounter {
        for _ in 0..200 {
            if let Some(encounter) = expedition.explore(id, None).unwrap().encounter {
                return encounter;
            }
        }
        panic!("no encounter in 200 explorations");
    }

    #[test]
    fn test_fight_without_encounter_conflicts() {
        let store = Arc::new(MemoryStore::new());
        let expedition = expedition_with(Arc::clone(&store));
        store.insert_player(new_player(expedition.catalog(), 1));

        let err = expedition.fight(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(expedition.decline(1).unwrap_err().kind(), ErrorKind::StateConflict);
        assert_eq!(
            expedition.act(1, CombatAction::Attack).unwrap_err().kind(),
            ErrorKind::NoActiveSession
        );
    }

    #[test]
    fn test_decline_costs_nothing() {
        let store = Arc::new(MemoryStore::new());
        let expedition = expedition_with(Arc::clone(&store));
        store.insert_player(new_player(expedition.catalog(), 1));

        find_encounter(&expedition, 1);
        let before = store.get_player(1).unwrap();
        expedition.decline(1).unwrap();
        assert_eq!(store.get_player(1).unwrap(), before);
        assert!(expedition.pending_encounter(1).is_none());
        assert!(expedition.active_session(1).is_none());
    }

    #[test]
    fn test_explore_blocked_during_battle() {
        let store = Arc::new(MemoryStore::new());
        let expedition = expedition_with(Arc::clone(&store));
        store.insert_player(new_player(expedition.catalog(), 1));

        find_encounter(&expedition, 1);
        expedition.fight(1).unwrap();
        assert_eq!(
            expedition.explore(1, None).unwrap_err().kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(expedition.fight(1).unwrap_err().kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_failed_settlement_keeps_battle_open() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            refuse: std::sync::atomic::AtomicBool::new(false),
        });
        let expedition = expedition_with(Arc::clone(&store));
        store.inner.insert_player(new_player(expedition.catalog(), 1));

        find_encounter(&expedition, 1);
        expedition.fight(1).unwrap();
        store.refuse.store(true, std::sync::atomic::Ordering::SeqCst);

        let err = expedition.flee(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        let session = expedition.active_session(1).unwrap();
        assert!(session.is_active());
        assert!(!session.is_retired());

        store.refuse.store(false, std::sync::atomic::Ordering::SeqCst);
        let before = store.get_player(1).unwrap().currency;
        let settlement = expedition.flee(1).unwrap();
        assert_eq!(settlement.reward.outcome, BattleOutcome::Fled);
        assert_eq!(settlement.record.currency, before.saturating_sub(12));
        assert!(expedition.active_session(1).is_none());
    }

    #[test]
    fn test_refused_idle_settlement_retried_next_sweep() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            refuse: std::sync::atomic::AtomicBool::new(false),
        });
        let expedition = expedition_with(Arc::clone(&store));
        store.inner.insert_player(new_player(expedition.catalog(), 1));

        find_encounter(&expedition, 1);
        expedition.fight(1).unwrap();
        let before = store.get_player(1).unwrap().currency;
        let later = Instant::now() + std::time::Duration::from_secs(10_000);

        store.refuse.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(expedition.sweep_idle(later).is_empty());
        assert!(expedition.active_session(1).unwrap().is_active());
        assert_eq!(store.get_player(1).unwrap().currency, before);

        store.refuse.store(false, std::sync::atomic::Ordering::SeqCst);
        let settled = expedition.sweep_idle(later);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].reward.outcome, BattleOutcome::Fled);
        assert_eq!(store.get_player(1).unwrap().currency, before.saturating_sub(12));
        assert!(expedition.active_session(1).is_none());
        assert!(expedition.sweep_idle(later).is_empty());
    }
}
