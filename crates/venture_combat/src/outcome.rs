//! # Battle Outcomes
//!
//! Turns a finished session into a reward or penalty descriptor. Nothing here
//! touches persistent player state; the caller applies the descriptor through
//! its persistence collaborator.

use serde::{Deserialize, Serialize};
use venture_economy::{
    CreatureId, FoundItem, PlayerId, ProgressionCurve, RewardDelta, RewardGenerator, ZoneId,
};

use crate::engine::CombatEngine;
use crate::error::{CombatError, CombatResult};
use crate::session::{CombatSession, SessionState, Victor};

/// How a battle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleOutcome {
    /// The creature fell.
    Victory,
    /// The player fell, or forfeited.
    Defeat,
    /// The player ran mid-battle.
    Fled,
}

/// What happens to idle sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleOutcome {
    /// Treat the player as having fled.
    #[default]
    AutoFlee,
    /// Treat the player as defeated.
    AutoForfeit,
}

/// Reward or penalty for one finished battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RewardResult {
    /// Player the result belongs to.
    pub player_id: PlayerId,
    /// How the battle ended.
    pub outcome: BattleOutcome,
    /// Zone of the battle.
    pub zone_id: ZoneId,
    /// Creature fought.
    pub creature_id: CreatureId,
    /// Coins gained or lost.
    pub currency_delta: i64,
    /// Experience gained.
    pub xp_gained: u64,
    /// Items dropped.
    pub loot: Vec<FoundItem>,
    /// Level before the battle.
    pub level_before: u32,
    /// Level after the XP gain.
    pub level_after: u32,
    /// Rounds fought.
    pub rounds: u32,
}

impl RewardResult {
    /// The persistence delta for this result.
    #[must_use]
    pub fn to_delta(&self) -> RewardDelta {
        RewardDelta {
            currency_delta: self.currency_delta,
            xp_delta: self.xp_gained,
            level_after: Some(self.level_after),
            items: self.loot.iter().map(FoundItem::grant).collect(),
        }
    }

    /// True if the player levelled up.
    #[must_use]
    pub const fn levelled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

impl CombatEngine {
    /// Computes the result of a completed battle and retires the session.
    ///
    /// # Errors
    ///
    /// - `StateConflict` if the battle is still running, was fled, or the
    ///   outcome was already applied
    /// - `EntityNotFound` if the session's zone left the catalog
    pub fn apply_outcome(
        &self,
        session: &mut CombatSession,
        base_reward_unit: u64,
    ) -> CombatResult<RewardResult> {
        ensure_not_retired(session)?;
        let victor = match session.state {
            SessionState::Complete(victor) => victor,
            SessionState::Active => {
                return Err(CombatError::StateConflict(format!(
                    "combat for player {} is still running",
                    session.player_id
                )))
            }
            SessionState::Fled => {
                return Err(CombatError::StateConflict(format!(
                    "player {} fled; the flee penalty was already computed",
                    session.player_id
                )))
            }
        };

        let result = match victor {
            Victor::Player => self.victory(session, base_reward_unit)?,
            Victor::Creature => self.penalty(
                session,
                BattleOutcome::Defeat,
                base_reward_unit,
                self.tuning().loss_penalty_ratio,
            ),
        };
        session.retired = true;

        tracing::info!(
            "Player {} battle outcome {:?}: {} coins, {} xp, {} drops",
            result.player_id,
            result.outcome,
            result.currency_delta,
            result.xp_gained,
            result.loot.len()
        );
        Ok(result)
    }

    /// Ends a running battle by fleeing and retires the session.
    ///
    /// # Errors
    ///
    /// Returns `StateConflict` if the battle is already over.
    pub fn flee(
        &self,
        session: &mut CombatSession,
        base_reward_unit: u64,
    ) -> CombatResult<RewardResult> {
        ensure_not_retired(session)?;
        if !session.is_active() {
            return Err(CombatError::StateConflict(format!(
                "combat for player {} is already over",
                session.player_id
            )));
        }

        session.state = SessionState::Fled;
        session.retired = true;
        let result = self.penalty(
            session,
            BattleOutcome::Fled,
            base_reward_unit,
            self.tuning().flee_penalty_ratio,
        );

        tracing::info!(
            "Player {} fled after {} rounds, penalty {}",
            result.player_id,
            result.rounds,
            -result.currency_delta
        );
        Ok(result)
    }

    /// Ends a running battle as a defeat and retires the session.
    ///
    /// # Errors
    ///
    /// Returns `StateConflict` if the battle is already over.
    pub fn forfeit(
        &self,
        session: &mut CombatSession,
        base_reward_unit: u64,
    ) -> CombatResult<RewardResult> {
        ensure_not_retired(session)?;
        if !session.is_active() {
            return Err(CombatError::StateConflict(format!(
                "combat for player {} is already over",
                session.player_id
            )));
        }
        session.state = SessionState::Complete(Victor::Creature);
        self.apply_outcome(session, base_reward_unit)
    }

    /// Resolves a session that sat idle for too long.
    ///
    /// A session that already finished but whose outcome was never applied
    /// gets its normal outcome.
    ///
    /// # Errors
    ///
    /// Returns `StateConflict` if the session was already retired.
    pub fn expire(
        &self,
        session: &mut CombatSession,
        base_reward_unit: u64,
        idle_outcome: IdleOutcome,
    ) -> CombatResult<RewardResult> {
        tracing::warn!(
            "Expiring idle combat for player {} in round {} ({:?})",
            session.player_id,
            session.round,
            idle_outcome
        );
        if !session.is_active() {
            return self.apply_outcome(session, base_reward_unit);
        }
        match idle_outcome {
            IdleOutcome::AutoFlee => self.flee(session, base_reward_unit),
            IdleOutcome::AutoForfeit => self.forfeit(session, base_reward_unit),
        }
    }

    fn victory(&self, session: &mut CombatSession, unit: u64) -> CombatResult<RewardResult> {
        let tuning = self.tuning();
        let zone = self.catalog().zone(session.zone_id)?;

        let mut difficulty =
            1.0 + tuning.rarity_reward_step * f64::from(session.creature_rarity.index());
        if session.empowered {
            difficulty *= tuning.empowered_reward_bonus;
        }
        let base = unit as f64 * difficulty;
        let coins = (base * zone.value_multiplier).floor() as u64;
        let xp_gained = (base * zone.xp_multiplier).floor() as u64;

        let loot = RewardGenerator::new(self.catalog()).roll_battle_loot(
            session.zone_id,
            session.creature_rarity,
            session.empowered,
            &mut session.rng,
        )?;

        let curve = ProgressionCurve::for_zone(zone);
        let level_after = curve
            .level_from_xp(session.player_total_xp.saturating_add(xp_gained))
            .max(session.player_level);

        Ok(RewardResult {
            player_id: session.player_id,
            outcome: BattleOutcome::Victory,
            zone_id: session.zone_id,
            creature_id: session.creature_id,
            currency_delta: i64::try_from(coins).unwrap_or(i64::MAX),
            xp_gained,
            loot,
            level_before: session.player_level,
            level_after,
            rounds: session.round,
        })
    }

    fn penalty(
        &self,
        session: &CombatSession,
        outcome: BattleOutcome,
        unit: u64,
        ratio: f64,
    ) -> RewardResult {
        let amount = (unit as f64 * ratio).floor() as u64;
        RewardResult {
            player_id: session.player_id,
            outcome,
            zone_id: session.zone_id,
            creature_id: session.creature_id,
            currency_delta: -i64::try_from(amount).unwrap_or(i64::MAX),
            xp_gained: 0,
            loot: Vec::new(),
            level_before: session.player_level,
            level_after: session.player_level,
            rounds: session.round,
        }
    }
}

fn ensure_not_retired(session: &CombatSession) -> CombatResult<()> {
    if session.retired {
        return Err(CombatError::StateConflict(format!(
            "combat for player {} was already settled",
            session.player_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::CombatAction;
    use crate::combatant::PlayerProfile;
    use crate::tuning::CombatTuning;
    use rand::SeedableRng;
    use std::sync::Arc;
    use venture_economy::{Catalog, GameRng, SeedDeriver};

    fn arena() -> CombatEngine {
        let catalog = Catalog::from_toml_str(include_str!("../tests/data/arena.toml")).unwrap();
        let tuning = CombatTuning {
            empowered_chance: 0.0,
            ..CombatTuning::default()
        };
        CombatEngine::new(Arc::new(catalog), tuning, SeedDeriver::test_seed())
    }

    fn start(engine: &CombatEngine, zone_id: ZoneId, creature_id: CreatureId) -> CombatSession {
        let profile = PlayerProfile {
            player_id: 3,
            class_id: 1,
            level: 1,
            total_xp: 0,
            equipment: Vec::new(),
            loadout: vec![1],
            ultimate: Some(9),
        };
        engine
            .initialize_session_with_rng(&profile, zone_id, creature_id, None, GameRng::seed_from_u64(5))
            .unwrap()
    }

    #[test]
    fn test_victory_rewards_scale_with_rarity() {
        let engine = arena();
        let mut session = start(&engine, 1, 2);
        engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();

        let result = engine.apply_outcome(&mut session, 100).unwrap();
        assert_eq!(result.outcome, BattleOutcome::Victory);
        // uncommon: 1 + 0.5 * 1
        assert_eq!(result.currency_delta, 150);
        assert_eq!(result.xp_gained, 150);
        assert_eq!(result.loot.len(), 1);
        assert_eq!(result.rounds, 1);
        assert!(session.is_retired());

        let delta = result.to_delta();
        assert_eq!(delta.items.len(), 1);
        assert_eq!(delta.level_after, Some(result.level_after));
    }

    #[test]
    fn test_victory_uses_zone_multipliers() {
        let engine = arena();
        let mut session = start(&engine, 2, 1);
        while session.is_active() {
            engine
                .resolve_action(&mut session, CombatAction::Attack)
                .unwrap();
        }
        assert!(session.player_won());

        let result = engine.apply_outcome(&mut session, 100).unwrap();
        assert_eq!(result.currency_delta, 200);
        assert_eq!(result.xp_gained, 150);
        assert_eq!(result.level_after, 1);
    }

    #[test]
    fn test_outcome_only_once() {
        let engine = arena();
        let mut session = start(&engine, 1, 3);
        engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();

        let result = engine.apply_outcome(&mut session, 100).unwrap();
        assert_eq!(result.outcome, BattleOutcome::Defeat);
        assert_eq!(result.currency_delta, -50);

        assert!(matches!(
            engine.apply_outcome(&mut session, 100),
            Err(CombatError::StateConflict(_))
        ));
    }

    #[test]
    fn test_outcome_rejected_while_active() {
        let engine = arena();
        let mut session = start(&engine, 1, 1);
        assert!(matches!(
            engine.apply_outcome(&mut session, 100),
            Err(CombatError::StateConflict(_))
        ));
        assert!(!session.is_retired());
    }

    #[test]
    fn test_flee_charges_exactly_once() {
        let engine = arena();
        let mut session = start(&engine, 1, 1);
        engine
            .resolve_action(&mut session, CombatAction::Attack)
            .unwrap();

        let result = engine.flee(&mut session, 100).unwrap();
        assert_eq!(result.outcome, BattleOutcome::Fled);
        assert_eq!(result.currency_delta, -25);
        assert!(session.is_retired());
        assert!(!session.player_won() && !session.beast_won());

        assert!(engine.flee(&mut session, 100).is_err());
        assert!(engine.apply_outcome(&mut session, 100).is_err());
        assert!(engine
            .resolve_action(&mut session, CombatAction::Attack)
            .is_err());
    }

    #[test]
    fn test_expire_follows_policy() {
        let engine = arena();

        let mut fled = start(&engine, 1, 1);
        let result = engine.expire(&mut fled, 100, IdleOutcome::AutoFlee).unwrap();
        assert_eq!(result.outcome, BattleOutcome::Fled);

        let mut forfeited = start(&engine, 1, 1);
        let result = engine
            .expire(&mut forfeited, 100, IdleOutcome::AutoForfeit)
            .unwrap();
        assert_eq!(result.outcome, BattleOutcome::Defeat);
        assert_eq!(result.currency_delta, -50);
        assert!(forfeited.beast_won());
    }
}
