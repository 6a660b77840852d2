//! # VENTURE Economy System
//!
//! Catalog, rewards, progression and crafting for the VENTURE simulation core.
//!
//! ## Design Principles
//!
//! 1. **Caller-owned randomness** - every roll takes an `Rng`, sessions get seeded `ChaCha8Rng`s
//! 2. **Atomic mutations** - rewards and crafts land in the store as one unit or not at all
//! 3. **Validated catalogs** - probabilities, zone scaling and recipe DAGs are checked at load
//! 4. **External configuration** - all balance data in TOML files
//!
//! ## Example
//!
//! ```rust,ignore
//! use venture_economy::{Catalog, RewardGenerator, SeedDeriver};
//!
//! let catalog = Catalog::builtin()?;
//! let mut rng = SeedDeriver::test_seed().rng_for(player_id, nonce);
//! let roll = RewardGenerator::new(&catalog).roll_exploration(zone_id, 1.0, &mut rng)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod catalog;
pub mod crafting;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod loot;
pub mod progression;
pub mod rng;
pub mod store;

pub use catalog::{
    AbilityDefinition, AbilityId, Catalog, CatalogDefinitions, ChestTier, ClassDefinition, ClassId,
    CreatureId, CreatureTemplate, DotKind, EffectDefinition, ItemCategory, ItemDefinition, ItemId,
    Rarity, RarityTier, RecipeDefinition, RecipeId, RecipeItem, Zone, ZoneId,
};
pub use crafting::{CraftResult, CraftingBench};
pub use error::{EconomyError, EconomyResult, EntityKind, Resource};
pub use inventory::Inventory;
pub use ledger::{Ledger, LedgerEntry, LedgerTransaction};
pub use loot::{
    apply_rewards, ChestReward, DynamicValue, ExplorationRoll, FoundItem, RewardGenerator,
    MAX_FOUND_ITEMS,
};
pub use progression::{LevelProgress, ProgressionCurve, MAX_LEVEL};
pub use rng::{roll_chance, GameRng, SeedDeriver};
pub use store::{
    CraftDelta, ItemGrant, MemoryStore, Persistence, PlayerId, PlayerRecord, RewardDelta,
};
