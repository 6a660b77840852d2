//! # Combat Session
//!
//! The mutable record of one battle between a player and a creature.
//!
//! ```text
//! ENCOUNTERED ──fight──► ACTIVE ──hp 0──► COMPLETE
//!      │                   │ ▲
//!      │ decline           │ └── round resolved
//!      ▼                   ▼
//!   (no session)         FLED
//! ```
//!
//! COMPLETE and FLED are absorbing. A session is retired once its outcome has
//! been computed and must not be acted on again.

use serde::Serialize;
use venture_economy::{CreatureId, EffectDefinition, GameRng, PlayerId, Rarity, ZoneId};

use crate::combatant::{Combatant, CreatureStats, Loadout};
use crate::log::RoundLog;
use crate::resources::{CooldownTable, ResourcePools};

/// Winner of a completed battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Victor {
    /// The player reduced the creature to 0 HP.
    Player,
    /// The creature reduced the player to 0 HP.
    Creature,
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Accepting actions.
    Active,
    /// One side reached 0 HP.
    Complete(Victor),
    /// The player fled mid-battle.
    Fled,
}

/// A creature met during exploration, before the player chooses to fight.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Encounter {
    /// Player who ran into it.
    pub player_id: PlayerId,
    /// Where.
    pub zone_id: ZoneId,
    /// Which creature.
    pub creature_id: CreatureId,
    /// Creature display name.
    pub creature_name: String,
    /// Creature rarity.
    pub rarity: Rarity,
    /// Stats scaled at encounter time, reused if the player fights.
    pub stats: CreatureStats,
}

/// One battle.
#[derive(Clone, Debug)]
pub struct CombatSession {
    pub(crate) player_id: PlayerId,
    pub(crate) zone_id: ZoneId,
    pub(crate) creature_id: CreatureId,
    pub(crate) creature_rarity: Rarity,
    pub(crate) empowered: bool,
    pub(crate) creature_on_hit: Option<EffectDefinition>,
    pub(crate) player_level: u32,
    pub(crate) player_total_xp: u64,
    pub(crate) player: Combatant,
    pub(crate) creature: Combatant,
    pub(crate) loadout: Loadout,
    pub(crate) resources: ResourcePools,
    pub(crate) cooldowns: CooldownTable,
    pub(crate) guard_up: bool,
    pub(crate) round: u32,
    pub(crate) log: Vec<RoundLog>,
    pub(crate) state: SessionState,
    pub(crate) retired: bool,
    pub(crate) rng: GameRng,
}

impl CombatSession {
    /// Owning player.
    #[must_use]
    pub const fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Zone the battle takes place in.
    #[must_use]
    pub const fn zone_id(&self) -> ZoneId {
        self.zone_id
    }

    /// Creature template id.
    #[must_use]
    pub const fn creature_id(&self) -> CreatureId {
        self.creature_id
    }

    /// Creature rarity.
    #[must_use]
    pub const fn creature_rarity(&self) -> Rarity {
        self.creature_rarity
    }

    /// Whether the creature is the empowered variant.
    #[must_use]
    pub const fn is_empowered(&self) -> bool {
        self.empowered
    }

    /// Player level when the session started.
    #[must_use]
    pub const fn player_level(&self) -> u32 {
        self.player_level
    }

    /// Player side.
    #[must_use]
    pub const fn player(&self) -> &Combatant {
        &self.player
    }

    /// Creature side.
    #[must_use]
    pub const fn creature(&self) -> &Combatant {
        &self.creature
    }

    /// Equipped abilities.
    #[must_use]
    pub const fn loadout(&self) -> &Loadout {
        &self.loadout
    }

    /// Energy and ultimate charge.
    #[must_use]
    pub const fn resources(&self) -> &ResourcePools {
        &self.resources
    }

    /// Per-action cooldowns.
    #[must_use]
    pub const fn cooldowns(&self) -> &CooldownTable {
        &self.cooldowns
    }

    /// Whether the next creature hit is reduced.
    #[must_use]
    pub const fn guard_up(&self) -> bool {
        self.guard_up
    }

    /// Current round, starting at 1.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Resolved rounds.
    #[must_use]
    pub fn log(&self) -> &[RoundLog] {
        &self.log
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// True while actions are accepted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active)
    }

    /// True if the player won.
    #[must_use]
    pub const fn player_won(&self) -> bool {
        matches!(self.state, SessionState::Complete(Victor::Player))
    }

    /// True if the creature won.
    #[must_use]
    pub const fn beast_won(&self) -> bool {
        matches!(self.state, SessionState::Complete(Victor::Creature))
    }

    /// True once the outcome has been computed.
    #[must_use]
    pub const fn is_retired(&self) -> bool {
        self.retired
    }
}
