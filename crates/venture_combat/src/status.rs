//! # Status Effects
//!
//! Stun counters, damage-over-time stacks and the creature rage meter.
//!
//! A second application of the same DoT flavour merges into the existing
//! stack, keeping the longer duration and the stronger tick. Stuns merge the
//! same way, by maximum remaining rounds.

use serde::Serialize;
use venture_economy::DotKind;

/// One damage-over-time stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DotStack {
    /// Flavour.
    pub kind: DotKind,
    /// Ticks left.
    pub remaining_ticks: u32,
    /// Damage dealt per tick.
    pub per_tick: u32,
}

/// Damage dealt by one stack in one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DotTick {
    /// Flavour.
    pub kind: DotKind,
    /// Damage dealt.
    pub damage: u32,
}

/// Status state of one combatant.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatusEffects {
    stun_rounds: u32,
    dots: Vec<DotStack>,
    rage: f64,
}

impl StatusEffects {
    /// No effects, no rage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while at least one blocked action remains.
    #[must_use]
    pub const fn is_stunned(&self) -> bool {
        self.stun_rounds > 0
    }

    /// Actions the stun will still block.
    #[must_use]
    pub const fn stun_rounds(&self) -> u32 {
        self.stun_rounds
    }

    /// Applies a stun of `rounds` blocked actions.
    pub fn apply_stun(&mut self, rounds: u32) {
        self.stun_rounds = self.stun_rounds.max(rounds);
    }

    /// Counts down the stun after it blocked an action.
    pub fn consume_stun(&mut self) {
        self.stun_rounds = self.stun_rounds.saturating_sub(1);
    }

    /// Adds or merges a DoT stack.
    pub fn apply_dot(&mut self, kind: DotKind, ticks: u32, per_tick: u32) {
        if ticks == 0 {
            return;
        }
        if let Some(existing) = self.dots.iter_mut().find(|d| d.kind == kind) {
            existing.remaining_ticks = existing.remaining_ticks.max(ticks);
            existing.per_tick = existing.per_tick.max(per_tick);
        } else {
            self.dots.push(DotStack {
                kind,
                remaining_ticks: ticks,
                per_tick: per_tick.max(1),
            });
        }
    }

    /// Active DoT stacks.
    #[must_use]
    pub fn dots(&self) -> &[DotStack] {
        &self.dots
    }

    /// Ticks every stack once, dropping expired ones.
    pub fn tick_dots(&mut self) -> Vec<DotTick> {
        let ticks = self
            .dots
            .iter_mut()
            .map(|stack| {
                stack.remaining_ticks -= 1;
                DotTick {
                    kind: stack.kind,
                    damage: stack.per_tick,
                }
            })
            .collect();
        self.dots.retain(|stack| stack.remaining_ticks > 0);
        ticks
    }

    /// Rage in `[0, 1]`.
    #[must_use]
    pub const fn rage(&self) -> f64 {
        self.rage
    }

    /// Builds rage, saturating at 1.0.
    pub fn build_rage(&mut self, amount: f64) {
        self.rage = (self.rage + amount.max(0.0)).min(1.0);
    }
}
