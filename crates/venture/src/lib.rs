//! # VENTURE Expedition Service
//!
//! One entry point over the economy and combat crates.
//!
//! ## Design Principles
//!
//! 1. **Structured results** - callers render; this crate never formats output
//! 2. **Settle under the lock** - battle outcomes persist while the session is held
//! 3. **Typed failures** - every error maps onto an [`ErrorKind`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use venture::{CombatAction, Expedition, VentureConfig};
//!
//! let expedition = Expedition::new(&config, catalog, store, seeds)?;
//! let report = expedition.explore(player_id, None)?;
//! if report.encounter.is_some() {
//!     expedition.fight(player_id)?;
//!     let step = expedition.act(player_id, CombatAction::Attack)?;
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod expedition;

pub use config::{RewardSettings, VentureConfig};
pub use error::{ErrorKind, VentureError, VentureResult};
pub use expedition::{ActionReport, Expedition, ExplorationReport, Settlement};

pub use venture_combat::{
    BattleOutcome, CombatAction, CombatSession, CombatTuning, Encounter, IdleOutcome,
    RewardResult, RoundLog, SessionPolicy,
};
pub use venture_economy::{Catalog, MemoryStore, Persistence, PlayerId, PlayerRecord, SeedDeriver};
