//! Energy, ultimate charge and cooldown bookkeeping.

use serde::Serialize;
use std::collections::BTreeMap;
use venture_economy::AbilityId;

/// Upper bound of both resource pools.
pub const RESOURCE_CAP: u32 = 100;

/// The player's energy and ultimate charge, both kept in `[0, RESOURCE_CAP]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ResourcePools {
    energy: u32,
    ultimate_charge: u32,
}

impl ResourcePools {
    /// Pools starting at `energy` (clamped) with an empty ultimate gauge.
    #[must_use]
    pub fn new(energy: u32) -> Self {
        Self {
            energy: energy.min(RESOURCE_CAP),
            ultimate_charge: 0,
        }
    }

    /// Current energy.
    #[must_use]
    pub const fn energy(&self) -> u32 {
        self.energy
    }

    /// Current ultimate charge.
    #[must_use]
    pub const fn ultimate_charge(&self) -> u32 {
        self.ultimate_charge
    }

    /// True when the gauge is full.
    #[must_use]
    pub const fn ultimate_ready(&self) -> bool {
        self.ultimate_charge >= RESOURCE_CAP
    }

    /// True if `cost` energy is available.
    #[must_use]
    pub const fn can_afford(&self, cost: u32) -> bool {
        self.energy >= cost
    }

    /// Adds energy, saturating at the cap.
    pub fn gain_energy(&mut self, amount: u32) {
        self.energy = self.energy.saturating_add(amount).min(RESOURCE_CAP);
    }

    /// Adds ultimate charge, saturating at the cap.
    pub fn gain_ultimate(&mut self, amount: u32) {
        self.ultimate_charge = self.ultimate_charge.saturating_add(amount).min(RESOURCE_CAP);
    }

    /// Spends `cost` energy. Returns false and leaves the pool alone if short.
    pub fn try_spend_energy(&mut self, cost: u32) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.energy -= cost;
        true
    }

    /// Empties the ultimate gauge.
    pub fn consume_ultimate(&mut self) {
        self.ultimate_charge = 0;
    }
}

/// What a cooldown is tracked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CooldownKey {
    /// The defend action.
    Defend,
    /// An equipped ability.
    Ability(AbilityId),
}

/// Rounds remaining per action. Absent keys are ready.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CooldownTable {
    remaining: BTreeMap<CooldownKey, u32>,
}

impl CooldownTable {
    /// An empty table; everything is ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rounds left before `key` can be used again.
    #[must_use]
    pub fn remaining(&self, key: CooldownKey) -> u32 {
        self.remaining.get(&key).copied().unwrap_or(0)
    }

    /// True if `key` can be used this round.
    #[must_use]
    pub fn is_ready(&self, key: CooldownKey) -> bool {
        self.remaining(key) == 0
    }

    /// Puts `key` on cooldown. The round of use counts towards `rounds`.
    pub fn start(&mut self, key: CooldownKey, rounds: u32) {
        if rounds == 0 {
            self.remaining.remove(&key);
        } else {
            self.remaining.insert(key, rounds);
        }
    }

    /// End-of-round decrement, dropping keys that reach 0.
    pub fn tick(&mut self) {
        self.remaining.retain(|_, rounds| {
            *rounds = rounds.saturating_sub(1);
            *rounds > 0
        });
    }

    /// Keys still cooling down.
    pub fn active(&self) -> impl Iterator<Item = (CooldownKey, u32)> + '_ {
        self.remaining.iter().map(|(key, rounds)| (*key, *rounds))
    }
}
