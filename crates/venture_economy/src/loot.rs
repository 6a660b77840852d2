//! # Reward Generator
//!
//! **Rarity-Weighted Exploration, Chest and Battle Loot**
//!
//! - Exploration: one independent trial per zone item, probability
//!   `zone.item_base_rate * rarity.drop_rate * map_multiplier` clamped to `[0, 1]`
//! - Chests: tiers rolled low to high, first success wins, chest item drawn
//!   uniformly from zone items at or above the tier's rarity
//! - Battle loot: weighted by rarity drop rate, capped at the creature's rarity
//!
//! Every roll draws from a caller-supplied generator, so results are
//! reproducible from a seed.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CreatureId, ItemCategory, ItemDefinition, ItemId, Rarity, Zone, ZoneId};
use crate::error::EconomyResult;
use crate::progression::ProgressionCurve;
use crate::rng::roll_chance;
use crate::store::{ItemGrant, Persistence, PlayerId, PlayerRecord, RewardDelta};

/// Most items a single exploration can yield.
pub const MAX_FOUND_ITEMS: usize = 3;

/// Value multiplier for derived materials.
const DERIVED_MATERIAL_VALUE_FACTOR: u64 = 2;

/// Quantity and value of one rolled drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicValue {
    /// Units dropped.
    pub quantity: u32,
    /// Coin value per unit.
    pub unit_value: u64,
    /// `quantity * unit_value`.
    pub total_value: u64,
}

/// A dropped item with its rolled value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundItem {
    /// The item ID.
    pub item_id: ItemId,
    /// Item rarity.
    pub rarity: Rarity,
    /// Units dropped.
    pub quantity: u32,
    /// Coin value per unit.
    pub unit_value: u64,
    /// Total coin value.
    pub total_value: u64,
}

impl FoundItem {
    fn new(item: &ItemDefinition, value: DynamicValue) -> Self {
        Self {
            item_id: item.id,
            rarity: item.rarity,
            quantity: value.quantity,
            unit_value: value.unit_value,
            total_value: value.total_value,
        }
    }

    /// The inventory grant for this drop.
    #[must_use]
    pub fn grant(&self) -> ItemGrant {
        ItemGrant::new(self.item_id, u64::from(self.quantity))
    }
}

/// A chest that opened during exploration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChestReward {
    /// Chest tier name.
    pub name: String,
    /// Rarity threshold of the tier.
    pub min_rarity: Rarity,
    /// Coins inside.
    pub coins: u64,
}

/// Everything one exploration produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationRoll {
    /// Items found, at most [`MAX_FOUND_ITEMS`], highest rarity first.
    pub found_items: Vec<FoundItem>,
    /// Chest, if one opened.
    pub chest: Option<ChestReward>,
    /// Item inside the chest.
    pub chest_item: Option<FoundItem>,
}

impl ExplorationRoll {
    /// Coin value of everything rolled, chest coins included.
    #[must_use]
    pub fn total_value(&self) -> u64 {
        let items: u64 = self
            .found_items
            .iter()
            .chain(self.chest_item.iter())
            .map(|item| item.total_value)
            .sum();
        items + self.chest.as_ref().map_or(0, |chest| chest.coins)
    }

    /// The persistence delta for this roll plus an XP award.
    #[must_use]
    pub fn to_delta(&self, xp_delta: u64, level_after: Option<u32>) -> RewardDelta {
        RewardDelta {
            currency_delta: self
                .chest
                .as_ref()
                .map_or(0, |chest| i64::try_from(chest.coins).unwrap_or(i64::MAX)),
            xp_delta,
            level_after,
            items: self
                .found_items
                .iter()
                .chain(self.chest_item.iter())
                .map(FoundItem::grant)
                .collect(),
        }
    }
}

/// Rolls rewards against a catalog.
#[derive(Clone, Copy, Debug)]
pub struct RewardGenerator<'a> {
    catalog: &'a Catalog,
}

impl<'a> RewardGenerator<'a> {
    /// Creates a generator over `catalog`.
    #[must_use]
    pub const fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Rolls quantity and value for a drop of `rarity` in `zone`.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the catalog has no row for `rarity`.
    pub fn roll_dynamic_value<R: Rng + ?Sized>(
        &self,
        rarity: Rarity,
        zone: &Zone,
        category: ItemCategory,
        rng: &mut R,
    ) -> EconomyResult<DynamicValue> {
        let tier = self.catalog.rarity_tier(rarity)?;
        let quantity = rng.gen_range(tier.min_quantity..=tier.max_quantity);

        let mut unit_value = (tier.base_value as f64 * zone.value_multiplier).floor() as u64;
        if category == ItemCategory::DerivedMaterial {
            unit_value = unit_value.saturating_mul(DERIVED_MATERIAL_VALUE_FACTOR);
        }

        Ok(DynamicValue {
            quantity,
            unit_value,
            total_value: unit_value.saturating_mul(u64::from(quantity)),
        })
    }

    fn roll_item<R: Rng + ?Sized>(
        &self,
        item: &ItemDefinition,
        zone: &Zone,
        rng: &mut R,
    ) -> EconomyResult<FoundItem> {
        let value = self.roll_dynamic_value(item.rarity, zone, item.category, rng)?;
        Ok(FoundItem::new(item, value))
    }

    /// Rolls one exploration of `zone_id`.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown zone.
    pub fn roll_exploration<R: Rng + ?Sized>(
        &self,
        zone_id: ZoneId,
        map_multiplier: f64,
        rng: &mut R,
    ) -> EconomyResult<ExplorationRoll> {
        let zone = self.catalog.zone(zone_id)?;
        let mut found_items = Vec::new();

        for &item_id in &zone.items {
            let item = self.catalog.item(item_id)?;
            let tier = self.catalog.rarity_tier(item.rarity)?;
            let chance = zone.item_base_rate * tier.drop_rate * map_multiplier;
            if roll_chance(rng, chance).0 {
                found_items.push(self.roll_item(item, zone, rng)?);
            }
        }

        if found_items.len() > MAX_FOUND_ITEMS {
            // Stable: equal rarities keep trial order.
            found_items.sort_by(|a, b| b.rarity.cmp(&a.rarity));
            found_items.truncate(MAX_FOUND_ITEMS);
        }

        let mut chest = None;
        let mut chest_item = None;
        for tier in self.catalog.chest_tiers() {
            if !roll_chance(rng, tier.drop_rate).0 {
                continue;
            }
            chest = Some(ChestReward {
                name: tier.name.clone(),
                min_rarity: tier.min_rarity,
                coins: rng.gen_range(tier.min_coins..=tier.max_coins),
            });

            let mut candidates = Vec::new();
            for &item_id in &zone.items {
                let item = self.catalog.item(item_id)?;
                if item.rarity >= tier.min_rarity {
                    candidates.push(item);
                }
            }
            if let Some(item) = candidates.choose(rng) {
                chest_item = Some(self.roll_item(item, zone, rng)?);
            }
            break;
        }

        tracing::debug!(
            "Exploration of {}: {} items, chest {:?}",
            zone.name,
            found_items.len(),
            chest.as_ref().map(|c| c.name.as_str())
        );

        Ok(ExplorationRoll {
            found_items,
            chest,
            chest_item,
        })
    }

    /// Rolls whether exploring `zone_id` runs into a creature.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown zone.
    pub fn roll_encounter<R: Rng + ?Sized>(
        &self,
        zone_id: ZoneId,
        rng: &mut R,
    ) -> EconomyResult<Option<CreatureId>> {
        let zone = self.catalog.zone(zone_id)?;
        if !roll_chance(rng, zone.encounter_chance).0 {
            return Ok(None);
        }
        Ok(zone.creatures.choose(rng).copied())
    }

    /// Rolls the loot for defeating a creature of `creature_rarity`.
    ///
    /// Empowered creatures drop one extra item, may drop one rarity higher,
    /// and double every quantity.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown zone.
    pub fn roll_battle_loot<R: Rng + ?Sized>(
        &self,
        zone_id: ZoneId,
        creature_rarity: Rarity,
        empowered: bool,
        rng: &mut R,
    ) -> EconomyResult<Vec<FoundItem>> {
        let zone = self.catalog.zone(zone_id)?;
        let cap = if empowered { creature_rarity.step_up() } else { creature_rarity };

        let mut candidates = Vec::new();
        let mut weights = Vec::new();
        for &item_id in &zone.items {
            let item = self.catalog.item(item_id)?;
            if item.rarity <= cap {
                weights.push(self.catalog.rarity_tier(item.rarity)?.drop_rate);
                candidates.push(item);
            }
        }

        let Ok(distribution) = WeightedIndex::new(&weights) else {
            return Ok(Vec::new());
        };

        let drops = if empowered { 2 } else { 1 };
        let mut loot = Vec::with_capacity(drops);
        for _ in 0..drops {
            let item = candidates[distribution.sample(rng)];
            let mut found = self.roll_item(item, zone, rng)?;
            if empowered {
                found.quantity = found.quantity.saturating_mul(2);
                found.total_value = found.unit_value.saturating_mul(u64::from(found.quantity));
            }
            loot.push(found);
        }
        Ok(loot)
    }
}

/// Applies an exploration roll and its XP award as one atomic unit.
///
/// The store raises the level along `curve` inside the same write.
///
/// # Errors
///
/// Propagates the store's error; nothing is applied in that case.
pub fn apply_rewards<P: Persistence + ?Sized>(
    store: &P,
    player_id: PlayerId,
    roll: &ExplorationRoll,
    xp_delta: u64,
    curve: &ProgressionCurve,
) -> EconomyResult<PlayerRecord> {
    let delta = roll.to_delta(xp_delta, None);
    let record = store.apply_progress_atomic(player_id, &delta, curve)?;
    tracing::info!(
        "Player {} exploration rewards applied: {} items, {} coins, {} xp",
        player_id,
        delta.items.len(),
        delta.currency_delta,
        xp_delta
    );
    Ok(record)
}
