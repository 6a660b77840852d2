//! Structured per-round battle log.

use serde::Serialize;
use venture_economy::DotKind;

use crate::action::CombatAction;
use crate::session::SessionState;
use crate::status::DotTick;

/// A status effect that landed this round.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusApplied {
    /// Target loses its next `rounds` actions.
    Stun {
        /// Blocked actions.
        rounds: u32,
    },
    /// Target takes `per_tick` for `ticks` rounds.
    DamageOverTime {
        /// Flavour.
        dot: DotKind,
        /// Ticks.
        ticks: u32,
        /// Damage per tick.
        per_tick: u32,
    },
}

/// What happened in one side's phase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhaseOutcome {
    /// The side was stunned and lost its action.
    Stunned,
    /// The phase did not run because the battle already ended.
    Skipped,
    /// The player raised a guard.
    Guarded,
    /// The attack was dodged.
    Dodged {
        /// The dodge roll.
        dodge_roll: f64,
    },
    /// The attack landed.
    Hit {
        /// HP removed from the target.
        damage: u32,
        /// Whether the crit roll succeeded.
        critical: bool,
        /// Whether a player guard reduced this hit.
        guarded: bool,
        /// The dodge roll.
        dodge_roll: f64,
        /// The crit roll.
        crit_roll: f64,
        /// The effect roll, when the attack carries an effect.
        effect_roll: Option<f64>,
        /// The effect that landed, if any.
        inflicted: Option<StatusApplied>,
    },
}

impl PhaseOutcome {
    /// True for a landed attack.
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    /// Damage dealt, 0 unless the attack landed.
    #[must_use]
    pub const fn damage(&self) -> u32 {
        match self {
            Self::Hit { damage, .. } => *damage,
            _ => 0,
        }
    }
}

/// One resolved round.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoundLog {
    /// Round number, starting at 1.
    pub round: u32,
    /// The submitted action.
    pub action: CombatAction,
    /// Player phase.
    pub player_phase: PhaseOutcome,
    /// Creature phase.
    pub creature_phase: PhaseOutcome,
    /// DoT damage taken by the creature.
    pub creature_ticks: Vec<DotTick>,
    /// DoT damage taken by the player.
    pub player_ticks: Vec<DotTick>,
    /// Player HP after the round.
    pub player_hp: u32,
    /// Creature HP after the round.
    pub creature_hp: u32,
    /// Energy after the round.
    pub energy: u32,
    /// Ultimate charge after the round.
    pub ultimate_charge: u32,
    /// Creature rage after the round.
    pub rage: f64,
    /// Session state after the round.
    pub state: SessionState,
}
