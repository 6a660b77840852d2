//! # Crafting
//!
//! **Transactional Recipe Application**
//!
//! 1. **Validated**: level, coins and every ingredient are checked first
//! 2. **Transactional**: the store applies consumption and production as one unit
//! 3. **No Duplication**: recipe graphs with cycles never pass catalog load
//!
//! The store re-checks affordability under its own lock, so two concurrent
//! crafts cannot both spend the same ingredients.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, RecipeDefinition, RecipeId, RecipeItem};
use crate::error::{EconomyError, EconomyResult};
use crate::store::{CraftDelta, Persistence, PlayerId, PlayerRecord};

/// Result of a successful craft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftResult {
    /// Recipe that was crafted.
    pub recipe_id: RecipeId,
    /// Items consumed.
    pub consumed: Vec<RecipeItem>,
    /// Coins spent.
    pub currency_spent: u64,
    /// Item produced.
    pub output: RecipeItem,
    /// Times the player has now crafted this recipe.
    pub crafted_count: u32,
    /// Player state after the craft.
    pub record: PlayerRecord,
}

/// Applies catalog recipes through a store.
pub struct CraftingBench<'a, P: Persistence + ?Sized> {
    catalog: &'a Catalog,
    store: &'a P,
}

impl<'a, P: Persistence + ?Sized> CraftingBench<'a, P> {
    /// Creates a bench over `catalog` and `store`.
    #[must_use]
    pub const fn new(catalog: &'a Catalog, store: &'a P) -> Self {
        Self { catalog, store }
    }

    fn delta_for(recipe: &RecipeDefinition) -> CraftDelta {
        CraftDelta {
            recipe_id: recipe.id,
            required_level: recipe.required_level,
            currency_cost: recipe.cost,
            ingredients: recipe.ingredients.clone(),
            output: recipe.output,
        }
    }

    /// Explains why a player cannot craft a recipe.
    ///
    /// # Errors
    ///
    /// - `EntityNotFound` if the player or recipe doesn't exist
    /// - `InsufficientResources` naming the first shortfall
    pub fn check(&self, player_id: PlayerId, recipe_id: RecipeId) -> EconomyResult<()> {
        let recipe = self.catalog.recipe(recipe_id)?;
        let record = self.store.get_player(player_id)?;
        Self::delta_for(recipe).check(&record)
    }

    /// Whether a player can craft a recipe right now.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the player or recipe doesn't exist.
    pub fn can_craft(&self, player_id: PlayerId, recipe_id: RecipeId) -> EconomyResult<bool> {
        match self.check(player_id, recipe_id) {
            Ok(()) => Ok(true),
            Err(EconomyError::InsufficientResources { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// Crafts a recipe.
    ///
    /// **ATOMIC**: coins and ingredients are deducted and the output credited
    /// together, or nothing changes.
    ///
    /// # Errors
    ///
    /// - `EntityNotFound` if the player or recipe doesn't exist
    /// - `InsufficientResources` if the player can't afford it
    pub fn craft(&self, player_id: PlayerId, recipe_id: RecipeId) -> EconomyResult<CraftResult> {
        let recipe = self.catalog.recipe(recipe_id)?;
        let delta = Self::delta_for(recipe);
        let record = self.store.apply_craft_atomic(player_id, &delta)?;

        tracing::info!(
            "Player {} crafted {} ({} coins, {} ingredient rows)",
            player_id,
            recipe.name,
            recipe.cost,
            recipe.ingredients.len()
        );

        Ok(CraftResult {
            recipe_id,
            consumed: delta.ingredients,
            currency_spent: delta.currency_cost,
            output: delta.output,
            crafted_count: record.crafted_count(recipe_id),
            record,
        })
    }
}
