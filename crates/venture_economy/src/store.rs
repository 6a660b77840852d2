//! # Persistence
//!
//! The simulation core reads and mutates player state only through the
//! [`Persistence`] trait. Every mutation is one all-or-nothing unit.
//!
//! [`MemoryStore`] is the in-process implementation: each player record sits
//! behind its own mutex, mutations are applied to a clone, journaled to the
//! optional [`Ledger`], and only then swapped in.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::catalog::{AbilityId, ClassDefinition, ClassId, ItemId, RecipeId, RecipeItem, ZoneId};
use crate::error::{EconomyError, EconomyResult, EntityKind, Resource};
use crate::inventory::Inventory;
use crate::ledger::{Ledger, LedgerEntry};
use crate::progression::ProgressionCurve;

/// Unique identifier for a player.
pub type PlayerId = u64;

/// Persistent player state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Unique player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Character class.
    pub class_id: ClassId,
    /// Zone the player is exploring.
    pub zone_id: ZoneId,
    /// Current level, never decreases.
    pub level: u32,
    /// Cumulative experience.
    pub total_xp: u64,
    /// Coin balance.
    pub currency: u64,
    /// Item rows.
    pub inventory: Inventory,
    /// Equipped items.
    pub equipment: Vec<ItemId>,
    /// Equipped abilities, at most four.
    pub loadout: Vec<AbilityId>,
    /// Times each recipe was crafted.
    pub crafted: BTreeMap<RecipeId, u32>,
}

impl PlayerRecord {
    /// A fresh level 1 character of `class` in `zone_id`.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, class: &ClassDefinition, zone_id: ZoneId) -> Self {
        Self {
            id,
            name: name.into(),
            class_id: class.id,
            zone_id,
            level: 1,
            total_xp: 0,
            currency: 0,
            inventory: Inventory::new(),
            equipment: Vec::new(),
            loadout: class.loadout.clone(),
            crafted: BTreeMap::new(),
        }
    }

    /// Sets the coin balance.
    #[must_use]
    pub fn with_currency(mut self, currency: u64) -> Self {
        self.currency = currency;
        self
    }

    /// Times `recipe_id` was crafted.
    #[must_use]
    pub fn crafted_count(&self, recipe_id: RecipeId) -> u32 {
        self.crafted.get(&recipe_id).copied().unwrap_or(0)
    }

    /// Applies a reward delta in place.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if a balance would overflow. The record may
    /// be partially updated in that case, so callers work on a clone.
    pub fn apply_reward(&mut self, delta: &RewardDelta) -> EconomyResult<()> {
        if delta.currency_delta >= 0 {
            self.currency = self
                .currency
                .checked_add(delta.currency_delta.unsigned_abs())
                .ok_or(EconomyError::ArithmeticOverflow)?;
        } else {
            // Penalties saturate at an empty purse.
            self.currency = self.currency.saturating_sub(delta.currency_delta.unsigned_abs());
        }
        self.total_xp = self
            .total_xp
            .checked_add(delta.xp_delta)
            .ok_or(EconomyError::ArithmeticOverflow)?;
        if let Some(level) = delta.level_after {
            self.level = self.level.max(level);
        }
        for grant in &delta.items {
            self.inventory.add(grant.item_id, grant.quantity)?;
        }
        Ok(())
    }

    /// Validates and applies a craft in place. Returns the new crafted count.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientResources` when the level, coins or any ingredient
    /// falls short. Validation happens before any change.
    pub fn apply_craft(&mut self, delta: &CraftDelta) -> EconomyResult<u32> {
        delta.check(self)?;

        self.currency -= delta.currency_cost;
        for ingredient in &delta.ingredients {
            self.inventory.remove(ingredient.item_id, u64::from(ingredient.quantity))?;
        }
        self.inventory.add(delta.output.item_id, u64::from(delta.output.quantity))?;

        let count = self.crafted.entry(delta.recipe_id).or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }
}

/// Units of one item granted to a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemGrant {
    /// The item ID.
    pub item_id: ItemId,
    /// Quantity granted.
    pub quantity: u64,
}

impl ItemGrant {
    /// Creates a grant.
    #[must_use]
    pub const fn new(item_id: ItemId, quantity: u64) -> Self {
        Self { item_id, quantity }
    }
}

/// Currency, experience and items applied as one unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDelta {
    /// Coins gained (positive) or lost (negative, saturating at zero).
    pub currency_delta: i64,
    /// Experience gained.
    pub xp_delta: u64,
    /// Level reached after the XP gain, if it was computed.
    pub level_after: Option<u32>,
    /// Items granted.
    pub items: Vec<ItemGrant>,
}

impl RewardDelta {
    /// A pure coin penalty.
    #[must_use]
    pub fn penalty(amount: u64) -> Self {
        Self {
            currency_delta: -i64::try_from(amount).unwrap_or(i64::MAX),
            ..Self::default()
        }
    }

    /// Whether applying the delta would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.currency_delta == 0 && self.xp_delta == 0 && self.items.is_empty()
    }
}

/// Everything a craft consumes and produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftDelta {
    /// Recipe being crafted.
    pub recipe_id: RecipeId,
    /// Minimum level.
    pub required_level: u32,
    /// Coins consumed.
    pub currency_cost: u64,
    /// Items consumed.
    pub ingredients: Vec<RecipeItem>,
    /// Item produced.
    pub output: RecipeItem,
}

impl CraftDelta {
    /// Checks that `record` can afford this craft.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientResources` naming the first shortfall.
    pub fn check(&self, record: &PlayerRecord) -> EconomyResult<()> {
        if record.level < self.required_level {
            return Err(EconomyError::InsufficientResources {
                resource: Resource::Level,
                required: u64::from(self.required_level),
                available: u64::from(record.level),
            });
        }
        if record.currency < self.currency_cost {
            return Err(EconomyError::InsufficientResources {
                resource: Resource::Currency,
                required: self.currency_cost,
                available: record.currency,
            });
        }
        record.inventory.check_all(&self.ingredients)
    }
}

/// Atomic access to player state.
pub trait Persistence: Send + Sync {
    /// Reads a player record.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the player does not exist.
    fn get_player(&self, id: PlayerId) -> EconomyResult<PlayerRecord>;

    /// Applies a reward or penalty as one unit and returns the new record.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown player. On any error nothing
    /// is applied.
    fn apply_reward_atomic(&self, id: PlayerId, delta: &RewardDelta) -> EconomyResult<PlayerRecord>;

    /// Applies a reward, then raises the level to what `curve` gives for the
    /// new XP total, all as one unit.
    ///
    /// The level is derived from the record as it stands under the write, so
    /// concurrent awards for one player never leave it behind its XP.
    ///
    /// # Errors
    ///
    /// As [`Persistence::apply_reward_atomic`].
    fn apply_progress_atomic(
        &self,
        id: PlayerId,
        delta: &RewardDelta,
        curve: &ProgressionCurve,
    ) -> EconomyResult<PlayerRecord>;

    /// Validates and applies a craft as one unit and returns the new record.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown player and
    /// `InsufficientResources` when the craft is unaffordable. On any error
    /// nothing is applied.
    fn apply_craft_atomic(&self, id: PlayerId, delta: &CraftDelta) -> EconomyResult<PlayerRecord>;
}

/// In-memory player store with optional journaling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    players: RwLock<HashMap<PlayerId, Arc<Mutex<PlayerRecord>>>>,
    ledger: Option<Ledger>,
}

impl MemoryStore {
    /// Creates an empty, unjournaled store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that journals every mutation to `ledger`.
    #[must_use]
    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            ledger: Some(ledger),
        }
    }

    /// Rebuilds a store from checkpointed records plus the ledger's
    /// recovered entries.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if an entry names a player missing from
    /// `checkpoint`, or the error a replayed mutation produces.
    pub fn recover(
        checkpoint: impl IntoIterator<Item = PlayerRecord>,
        ledger: Ledger,
    ) -> EconomyResult<Self> {
        let mut players: HashMap<PlayerId, PlayerRecord> =
            checkpoint.into_iter().map(|record| (record.id, record)).collect();

        for entry in ledger.recovered_entries() {
            let record = players
                .get_mut(&entry.player_id())
                .ok_or_else(|| EconomyError::not_found(EntityKind::Player, entry.player_id()))?;
            match entry {
                LedgerEntry::Reward { delta, .. } => record.apply_reward(delta)?,
                LedgerEntry::Craft { delta, .. } => {
                    record.apply_craft(delta)?;
                }
            }
        }

        tracing::info!(
            "Store recovered {} players from {} ledger entries",
            players.len(),
            ledger.recovered_entries().len()
        );

        Ok(Self {
            players: RwLock::new(
                players
                    .into_iter()
                    .map(|(id, record)| (id, Arc::new(Mutex::new(record))))
                    .collect(),
            ),
            ledger: Some(ledger),
        })
    }

    /// Inserts or replaces a player record.
    pub fn insert_player(&self, record: PlayerRecord) {
        self.players.write().insert(record.id, Arc::new(Mutex::new(record)));
    }

    /// Number of stored players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.read().len()
    }

    /// The journal, if one is attached.
    #[must_use]
    pub fn ledger(&self) -> Option<&Ledger> {
        self.ledger.as_ref()
    }

    fn slot(&self, id: PlayerId) -> EconomyResult<Arc<Mutex<PlayerRecord>>> {
        self.players
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| EconomyError::not_found(EntityKind::Player, id))
    }

    /// Clones the record, mutates the clone, journals, then swaps it in.
    fn mutate<T>(
        &self,
        id: PlayerId,
        change: impl FnOnce(&mut PlayerRecord) -> EconomyResult<T>,
        entry: impl FnOnce(&PlayerRecord) -> LedgerEntry,
    ) -> EconomyResult<PlayerRecord> {
        let slot = self.slot(id)?;
        let mut current = slot.lock();

        let mut next = current.clone();
        change(&mut next)?;

        if let Some(ledger) = &self.ledger {
            ledger.append(entry(&next))?;
        }

        *current = next.clone();
        Ok(next)
    }
}

impl Persistence for MemoryStore {
    fn get_player(&self, id: PlayerId) -> EconomyResult<PlayerRecord> {
        Ok(self.slot(id)?.lock().clone())
    }

    fn apply_reward_atomic(&self, id: PlayerId, delta: &RewardDelta) -> EconomyResult<PlayerRecord> {
        let record = self.mutate(
            id,
            |record| record.apply_reward(delta),
            |_| LedgerEntry::Reward {
                player_id: id,
                delta: delta.clone(),
            },
        )?;
        tracing::debug!(
            "Player {} reward applied: {:+} coins, {} xp, {} item rows",
            id,
            delta.currency_delta,
            delta.xp_delta,
            delta.items.len()
        );
        Ok(record)
    }

    fn apply_progress_atomic(
        &self,
        id: PlayerId,
        delta: &RewardDelta,
        curve: &ProgressionCurve,
    ) -> EconomyResult<PlayerRecord> {
        let record = self.mutate(
            id,
            |record| {
                record.apply_reward(delta)?;
                record.level = record.level.max(curve.level_from_xp(record.total_xp));
                Ok(())
            },
            // Journal the resolved level so replay needs no curve.
            |next| LedgerEntry::Reward {
                player_id: id,
                delta: RewardDelta {
                    level_after: Some(next.level),
                    ..delta.clone()
                },
            },
        )?;
        tracing::debug!(
            "Player {} progress applied: {:+} coins, {} xp, level {}",
            id,
            delta.currency_delta,
            delta.xp_delta,
            record.level
        );
        Ok(record)
    }

    fn apply_craft_atomic(&self, id: PlayerId, delta: &CraftDelta) -> EconomyResult<PlayerRecord> {
        self.mutate(
            id,
            |record| record.apply_craft(delta),
            |_| LedgerEntry::Craft {
                player_id: id,
                delta: delta.clone(),
            },
        )
    }
}
