//! # Static Catalog
//!
//! Zones, rarity tiers, chest tiers, items, creatures, abilities, classes and
//! recipes. Everything here is immutable after load and shared behind an `Arc`.
//!
//! ## Validation
//!
//! A catalog is validated once, at load:
//!
//! 1. **References**: every id a zone, class or recipe mentions must exist
//! 2. **Probabilities**: every chance lies in `[0, 1]`
//! 3. **Zone scaling**: value and XP multipliers never decrease with zone tier
//! 4. **No cycles**: the recipe graph is a DAG (Kahn's algorithm), so no recipe
//!    chain can produce items from nothing
//!
//! ## Example
//!
//! ```rust,ignore
//! let catalog = Catalog::builtin()?;
//! let zone = catalog.zone_by_name("Jungle Ruins").expect("starter zone");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use crate::error::{EconomyError, EconomyResult, EntityKind};

/// Unique identifier for an item.
pub type ItemId = u32;
/// Unique identifier for a zone.
pub type ZoneId = u32;
/// Unique identifier for a creature template.
pub type CreatureId = u32;
/// Unique identifier for an ability.
pub type AbilityId = u32;
/// Unique identifier for a character class.
pub type ClassId = u32;
/// Unique identifier for a recipe.
pub type RecipeId = u32;

/// The catalog bundled with the crate.
const BUILTIN_CATALOG: &str = include_str!("../data/catalog.toml");

/// Rarity tier for items and creatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Rarity {
    /// Common items (gray)
    Common = 0,
    /// Uncommon items (green)
    Uncommon = 1,
    /// Rare items (blue)
    Rare = 2,
    /// Epic items (purple)
    Epic = 3,
    /// Legendary items (orange)
    Legendary = 4,
    /// Mythic items (red)
    Mythic = 5,
}

impl Rarity {
    /// All rarities, lowest first.
    pub const ALL: [Self; 6] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
        Self::Mythic,
    ];

    /// Position of this rarity in [`Rarity::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// The next rarity up, saturating at `Mythic`.
    #[must_use]
    pub const fn step_up(self) -> Self {
        match self {
            Self::Common => Self::Uncommon,
            Self::Uncommon => Self::Rare,
            Self::Rare => Self::Epic,
            Self::Epic => Self::Legendary,
            Self::Legendary | Self::Mythic => Self::Mythic,
        }
    }
}

/// Per-rarity economic parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RarityTier {
    /// The rarity this row describes.
    pub rarity: Rarity,
    /// Display name.
    pub name: String,
    /// Coin value of one unit before zone scaling.
    pub base_value: u64,
    /// Smallest quantity a single drop yields.
    pub min_quantity: u32,
    /// Largest quantity a single drop yields.
    pub max_quantity: u32,
    /// Base probability that an item of this rarity drops.
    pub drop_rate: f64,
}

/// A zone and its independent value/XP multipliers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Unique zone identifier.
    pub id: ZoneId,
    /// Display name.
    pub name: String,
    /// Difficulty tier, 1 = easiest.
    pub tier: u32,
    /// Multiplier on item and coin values.
    pub value_multiplier: f64,
    /// Multiplier on experience, also scales the level curve.
    pub xp_multiplier: f64,
    /// Base chance for each zone item to be found on exploration.
    pub item_base_rate: f64,
    /// Chance that an exploration triggers a creature encounter.
    pub encounter_chance: f64,
    /// Items that can be found here.
    pub items: Vec<ItemId>,
    /// Creatures that roam here.
    pub creatures: Vec<CreatureId>,
}

/// A chest tier. Tiers are rolled low to high, first success wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChestTier {
    /// Display name.
    pub name: String,
    /// The chest item is drawn from zone items at or above this rarity.
    pub min_rarity: Rarity,
    /// Smallest coin reward.
    pub min_coins: u64,
    /// Largest coin reward.
    pub max_coins: u64,
    /// Independent probability for this tier.
    pub drop_rate: f64,
}

/// What kind of thing an item is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    /// Raw gathered material.
    Material,
    /// Refined material worth double its rarity value.
    DerivedMaterial,
    /// Wearable gear with stat bonuses.
    Equipment,
    /// Single-use item.
    Consumable,
    /// Creature drop with no use besides its value.
    Trophy,
}

/// Static item definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Unique item identifier.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Item category.
    pub category: ItemCategory,
    /// Max HP granted while equipped.
    #[serde(default)]
    pub hp_bonus: u32,
    /// Attack granted while equipped.
    #[serde(default)]
    pub attack_bonus: u32,
    /// Defense granted while equipped.
    #[serde(default)]
    pub defense_bonus: u32,
}

/// Damage-over-time flavours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DotKind {
    /// Physical bleeding.
    Bleed,
    /// Poison.
    Poison,
    /// Fire.
    Burn,
}

/// A status effect an ability or creature can inflict on hit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectDefinition {
    /// Blocks the target's next actions.
    Stun {
        /// Number of blocked actions.
        rounds: u32,
        /// Probability the stun lands.
        chance: f64,
    },
    /// Deals damage at the end of each round.
    DamageOverTime {
        /// Flavour.
        dot: DotKind,
        /// Number of ticks.
        ticks: u32,
        /// Per-tick damage as a fraction of the source's attack.
        power: f64,
        /// Probability the effect lands.
        chance: f64,
    },
}

impl EffectDefinition {
    /// Probability this effect lands on a hit.
    #[must_use]
    pub const fn chance(&self) -> f64 {
        match self {
            Self::Stun { chance, .. } | Self::DamageOverTime { chance, .. } => *chance,
        }
    }
}

/// Static creature template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatureTemplate {
    /// Unique creature identifier.
    pub id: CreatureId,
    /// Display name.
    pub name: String,
    /// Rarity tier, drives rewards.
    pub rarity: Rarity,
    /// Base max HP before level/zone scaling.
    pub hp: u32,
    /// Base attack before scaling.
    pub attack: u32,
    /// Base defense before scaling.
    pub defense: u32,
    /// Chance to dodge a player attack.
    #[serde(default)]
    pub dodge_chance: f64,
    /// Chance to land a critical hit.
    #[serde(default)]
    pub crit_chance: f64,
    /// Effect inflicted on a landed hit.
    #[serde(default)]
    pub on_hit: Option<EffectDefinition>,
}

/// Static ability definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    /// Unique ability identifier.
    pub id: AbilityId,
    /// Display name.
    pub name: String,
    /// Damage multiplier applied to attack.
    pub multiplier: f64,
    /// Energy spent on use.
    #[serde(default)]
    pub energy_cost: u32,
    /// Rounds before the ability can be used again.
    #[serde(default)]
    pub cooldown: u32,
    /// Added to the class crit chance.
    #[serde(default)]
    pub crit_bonus: f64,
    /// Whether this ability sits in the ultimate slot.
    #[serde(default)]
    pub ultimate: bool,
    /// Effect inflicted on a landed hit.
    #[serde(default)]
    pub effect: Option<EffectDefinition>,
}

/// Static character class definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassDefinition {
    /// Unique class identifier.
    pub id: ClassId,
    /// Display name.
    pub name: String,
    /// Max HP at level 1.
    pub base_hp: u32,
    /// Attack at level 1.
    pub base_attack: u32,
    /// Defense at level 1.
    pub base_defense: u32,
    /// Max HP gained per level.
    pub hp_per_level: u32,
    /// Attack gained per level.
    pub attack_per_level: u32,
    /// Defense gained per level.
    pub defense_per_level: u32,
    /// Chance to land a critical hit.
    pub crit_chance: f64,
    /// Chance to dodge a creature attack.
    pub dodge_chance: f64,
    /// Abilities equipped for new characters.
    pub loadout: Vec<AbilityId>,
    /// The class ultimate.
    pub ultimate: AbilityId,
}

/// Input or output item in a recipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipeItem {
    /// The item ID.
    pub item_id: ItemId,
    /// Quantity required/produced.
    pub quantity: u32,
}

impl RecipeItem {
    /// Creates a new recipe item.
    #[inline]
    #[must_use]
    pub const fn new(item_id: ItemId, quantity: u32) -> Self {
        Self { item_id, quantity }
    }
}

/// A crafting recipe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeDefinition {
    /// Unique recipe identifier.
    pub id: RecipeId,
    /// Human-readable name.
    pub name: String,
    /// Minimum player level required.
    #[serde(default = "default_required_level")]
    pub required_level: u32,
    /// Coins consumed.
    #[serde(default)]
    pub cost: u64,
    /// Items consumed.
    pub ingredients: Vec<RecipeItem>,
    /// Item produced.
    pub output: RecipeItem,
}

const fn default_required_level() -> u32 {
    1
}

impl RecipeDefinition {
    /// Sets the required level.
    #[must_use]
    pub const fn with_level(mut self, level: u32) -> Self {
        self.required_level = level;
        self
    }

    /// Sets the coin cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }
}

/// Raw catalog contents, as they appear in TOML.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogDefinitions {
    /// Rarity tier rows.
    #[serde(rename = "rarity")]
    pub rarities: Vec<RarityTier>,
    /// Zones.
    #[serde(rename = "zone")]
    pub zones: Vec<Zone>,
    /// Chest tiers.
    #[serde(rename = "chest", default)]
    pub chests: Vec<ChestTier>,
    /// Items.
    #[serde(rename = "item", default)]
    pub items: Vec<ItemDefinition>,
    /// Creatures.
    #[serde(rename = "creature", default)]
    pub creatures: Vec<CreatureTemplate>,
    /// Abilities.
    #[serde(rename = "ability", default)]
    pub abilities: Vec<AbilityDefinition>,
    /// Classes.
    #[serde(rename = "class", default)]
    pub classes: Vec<ClassDefinition>,
    /// Recipes.
    #[serde(rename = "recipe", default)]
    pub recipes: Vec<RecipeDefinition>,
}

/// Validated, indexed catalog.
#[derive(Clone, Debug)]
pub struct Catalog {
    rarities: BTreeMap<Rarity, RarityTier>,
    zones: BTreeMap<ZoneId, Zone>,
    chests: Vec<ChestTier>,
    items: BTreeMap<ItemId, ItemDefinition>,
    creatures: BTreeMap<CreatureId, CreatureTemplate>,
    abilities: BTreeMap<AbilityId, AbilityDefinition>,
    classes: BTreeMap<ClassId, ClassDefinition>,
    recipes: BTreeMap<RecipeId, RecipeDefinition>,
}

impl Catalog {
    /// Loads the catalog bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns error if the bundled data fails validation.
    pub fn builtin() -> EconomyResult<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Loads a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> EconomyResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EconomyError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates a catalog from TOML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a valid catalog.
    pub fn from_toml_str(text: &str) -> EconomyResult<Self> {
        let definitions: CatalogDefinitions =
            toml::from_str(text).map_err(|e| EconomyError::InvalidConfig(e.to_string()))?;
        Self::from_definitions(definitions)
    }

    /// Indexes and validates raw definitions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on duplicate ids, dangling references, bad
    /// probabilities or non-monotonic zone multipliers, and `CycleDetected`
    /// when the recipe graph has a cycle.
    pub fn from_definitions(definitions: CatalogDefinitions) -> EconomyResult<Self> {
        let CatalogDefinitions {
            rarities,
            zones,
            mut chests,
            items,
            creatures,
            abilities,
            classes,
            recipes,
        } = definitions;

        chests.sort_by_key(|chest| chest.min_rarity);

        let catalog = Self {
            rarities: index_unique(rarities, |r| r.rarity, "rarity tier")?,
            zones: index_unique(zones, |z| z.id, "zone")?,
            chests,
            items: index_unique(items, |i| i.id, "item")?,
            creatures: index_unique(creatures, |c| c.id, "creature")?,
            abilities: index_unique(abilities, |a| a.id, "ability")?,
            classes: index_unique(classes, |c| c.id, "class")?,
            recipes: index_unique(recipes, |r| r.id, "recipe")?,
        };

        catalog.validate()?;

        tracing::info!(
            "Catalog loaded: {} zones, {} items, {} creatures, {} recipes",
            catalog.zones.len(),
            catalog.items.len(),
            catalog.creatures.len(),
            catalog.recipes.len()
        );

        Ok(catalog)
    }

    fn validate(&self) -> EconomyResult<()> {
        for tier in self.rarities.values() {
            check_probability(tier.drop_rate, &tier.name)?;
            if tier.min_quantity == 0 || tier.min_quantity > tier.max_quantity {
                return Err(EconomyError::InvalidConfig(format!(
                    "rarity tier {} has an empty quantity range",
                    tier.name
                )));
            }
        }

        for chest in &self.chests {
            check_probability(chest.drop_rate, &chest.name)?;
            if chest.min_coins > chest.max_coins {
                return Err(EconomyError::InvalidConfig(format!(
                    "chest {} has an empty coin range",
                    chest.name
                )));
            }
        }

        for item in self.items.values() {
            if !self.rarities.contains_key(&item.rarity) {
                return Err(EconomyError::InvalidConfig(format!(
                    "item {} uses rarity {:?} without a tier row",
                    item.id, item.rarity
                )));
            }
        }

        self.validate_zones()?;

        for creature in self.creatures.values() {
            if let Some(effect) = &creature.on_hit {
                check_probability(effect.chance(), &creature.name)?;
            }
            check_probability(creature.dodge_chance, &creature.name)?;
            check_probability(creature.crit_chance, &creature.name)?;
        }

        for ability in self.abilities.values() {
            if let Some(effect) = &ability.effect {
                check_probability(effect.chance(), &ability.name)?;
            }
        }

        for class in self.classes.values() {
            for &ability_id in &class.loadout {
                self.ability(ability_id)?;
            }
            if !self.ability(class.ultimate)?.ultimate {
                return Err(EconomyError::InvalidConfig(format!(
                    "class {} ultimate {} is not an ultimate ability",
                    class.name, class.ultimate
                )));
            }
        }

        for recipe in self.recipes.values() {
            if recipe.ingredients.is_empty() {
                return Err(EconomyError::InvalidConfig(format!(
                    "recipe {} must have at least one ingredient",
                    recipe.id
                )));
            }
            for ingredient in recipe.ingredients.iter().chain(std::iter::once(&recipe.output)) {
                self.item(ingredient.item_id)?;
                if ingredient.quantity == 0 {
                    return Err(EconomyError::InvalidConfig(format!(
                        "recipe {} lists item {} with zero quantity",
                        recipe.id, ingredient.item_id
                    )));
                }
            }
        }

        self.validate_no_cycles()
    }

    fn validate_zones(&self) -> EconomyResult<()> {
        let mut by_tier: Vec<&Zone> = self.zones.values().collect();
        by_tier.sort_by_key(|zone| zone.tier);

        for zone in &by_tier {
            check_probability(zone.item_base_rate, &zone.name)?;
            check_probability(zone.encounter_chance, &zone.name)?;
            let positive = |m: f64| m.is_finite() && m > 0.0;
            if !positive(zone.value_multiplier) || !positive(zone.xp_multiplier) {
                return Err(EconomyError::InvalidConfig(format!(
                    "zone {} multipliers must be positive and finite",
                    zone.name
                )));
            }
            for &item_id in &zone.items {
                self.item(item_id)?;
            }
            for &creature_id in &zone.creatures {
                self.creature(creature_id)?;
            }
        }

        for pair in by_tier.windows(2) {
            let (easier, harder) = (pair[0], pair[1]);
            if harder.value_multiplier < easier.value_multiplier
                || harder.xp_multiplier < easier.xp_multiplier
            {
                return Err(EconomyError::InvalidConfig(format!(
                    "zone {} (tier {}) scales below zone {} (tier {})",
                    harder.name, harder.tier, easier.name, easier.tier
                )));
            }
        }

        Ok(())
    }

    /// Validates that the recipe graph has no cycles.
    ///
    /// Uses Kahn's algorithm: recipe A points at recipe B when A produces
    /// something B consumes. If every recipe gets sorted, the graph is a DAG.
    fn validate_no_cycles(&self) -> EconomyResult<()> {
        let mut producers: HashMap<ItemId, Vec<RecipeId>> = HashMap::new();
        for recipe in self.recipes.values() {
            producers.entry(recipe.output.item_id).or_default().push(recipe.id);
        }

        let mut in_degree: BTreeMap<RecipeId, usize> =
            self.recipes.keys().map(|&id| (id, 0)).collect();
        let mut adjacency: HashMap<RecipeId, Vec<RecipeId>> = HashMap::new();

        for recipe in self.recipes.values() {
            for ingredient in &recipe.ingredients {
                let Some(sources) = producers.get(&ingredient.item_id) else {
                    continue;
                };
                for &producer in sources {
                    if producer == recipe.id {
                        // A recipe consuming its own output can never net-create items
                        // unless it outputs more than it eats.
                        if recipe.output.quantity > ingredient.quantity {
                            return Err(EconomyError::CycleDetected(recipe.id));
                        }
                        continue;
                    }
                    adjacency.entry(producer).or_default().push(recipe.id);
                    *in_degree.entry(recipe.id).or_insert(0) += 1;
                }
            }
        }

        let mut queue: VecDeque<RecipeId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut sorted = 0;

        while let Some(recipe_id) = queue.pop_front() {
            sorted += 1;
            for &next in adjacency.get(&recipe_id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        if sorted == self.recipes.len() {
            return Ok(());
        }

        let stuck = in_degree
            .iter()
            .find(|(_, &degree)| degree > 0)
            .map_or(0, |(&id, _)| id);
        Err(EconomyError::CycleDetected(stuck))
    }

    /// Looks up the parameters for a rarity.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the catalog has no row for it.
    pub fn rarity_tier(&self, rarity: Rarity) -> EconomyResult<&RarityTier> {
        self.rarities
            .get(&rarity)
            .ok_or_else(|| EconomyError::not_found(EntityKind::RarityTier, rarity.index()))
    }

    /// Looks up a zone.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the zone does not exist.
    pub fn zone(&self, id: ZoneId) -> EconomyResult<&Zone> {
        self.zones.get(&id).ok_or_else(|| EconomyError::not_found(EntityKind::Zone, id))
    }

    /// Finds a zone by display name.
    #[must_use]
    pub fn zone_by_name(&self, name: &str) -> Option<&Zone> {
        self.zones.values().find(|zone| zone.name == name)
    }

    /// All zones, ordered by id.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Chest tiers, lowest rarity threshold first.
    #[must_use]
    pub fn chest_tiers(&self) -> &[ChestTier] {
        &self.chests
    }

    /// Looks up an item.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the item does not exist.
    pub fn item(&self, id: ItemId) -> EconomyResult<&ItemDefinition> {
        self.items.get(&id).ok_or_else(|| EconomyError::not_found(EntityKind::Item, id))
    }

    /// Looks up a creature template.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the creature does not exist.
    pub fn creature(&self, id: CreatureId) -> EconomyResult<&CreatureTemplate> {
        self.creatures
            .get(&id)
            .ok_or_else(|| EconomyError::not_found(EntityKind::Creature, id))
    }

    /// Looks up an ability.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the ability does not exist.
    pub fn ability(&self, id: AbilityId) -> EconomyResult<&AbilityDefinition> {
        self.abilities
            .get(&id)
            .ok_or_else(|| EconomyError::not_found(EntityKind::Ability, id))
    }

    /// Looks up a character class.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the class does not exist.
    pub fn class(&self, id: ClassId) -> EconomyResult<&ClassDefinition> {
        self.classes.get(&id).ok_or_else(|| EconomyError::not_found(EntityKind::Class, id))
    }

    /// Looks up a recipe.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the recipe does not exist.
    pub fn recipe(&self, id: RecipeId) -> EconomyResult<&RecipeDefinition> {
        self.recipes.get(&id).ok_or_else(|| EconomyError::not_found(EntityKind::Recipe, id))
    }

    /// All recipes, ordered by id.
    pub fn recipes(&self) -> impl Iterator<Item = &RecipeDefinition> {
        self.recipes.values()
    }
}

fn index_unique<K: Ord + Copy + std::fmt::Debug, V>(
    rows: Vec<V>,
    key: impl Fn(&V) -> K,
    what: &str,
) -> EconomyResult<BTreeMap<K, V>> {
    let mut map = BTreeMap::new();
    for row in rows {
        let id = key(&row);
        if map.insert(id, row).is_some() {
            return Err(EconomyError::InvalidConfig(format!("duplicate {what} {id:?}")));
        }
    }
    Ok(map)
}

fn check_probability(value: f64, owner: &str) -> EconomyResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EconomyError::InvalidConfig(format!(
            "{owner}: probability {value} outside [0, 1]"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_definitions() -> CatalogDefinitions {
        CatalogDefinitions {
            rarities: vec![RarityTier {
                rarity: Rarity::Common,
                name: "Common".to_string(),
                base_value: 5,
                min_quantity: 1,
                max_quantity: 3,
                drop_rate: 0.6,
            }],
            zones: vec![Zone {
                id: 1,
                name: "Meadow".to_string(),
                tier: 1,
                value_multiplier: 1.0,
                xp_multiplier: 1.0,
                item_base_rate: 0.5,
                encounter_chance: 0.2,
                items: vec![1, 2, 3],
                creatures: vec![],
            }],
            items: (1..=3)
                .map(|id| ItemDefinition {
                    id,
                    name: format!("Item {id}"),
                    rarity: Rarity::Common,
                    category: ItemCategory::Material,
                    hp_bonus: 0,
                    attack_bonus: 0,
                    defense_bonus: 0,
                })
                .collect(),
            ..CatalogDefinitions::default()
        }
    }

    fn recipe(id: RecipeId, input: ItemId, output: ItemId) -> RecipeDefinition {
        RecipeDefinition {
            id,
            name: format!("Recipe {id}"),
            required_level: 1,
            cost: 0,
            ingredients: vec![RecipeItem::new(input, 1)],
            output: RecipeItem::new(output, 1),
        }
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.zone_by_name("Jungle Ruins").is_some());
        assert!(catalog.chest_tiers().windows(2).all(|w| w[0].min_rarity <= w[1].min_rarity));
        for rarity in Rarity::ALL {
            assert!(catalog.rarity_tier(rarity).is_ok());
        }
    }

    #[test]
    fn test_recipe_chain_accepted() {
        let mut defs = minimal_definitions();
        defs.recipes = vec![recipe(1, 1, 2), recipe(2, 2, 3)];
        assert!(Catalog::from_definitions(defs).is_ok());
    }

    #[test]
    fn test_recipe_cycle_rejected() {
        let mut defs = minimal_definitions();
        defs.recipes = vec![recipe(1, 1, 2), recipe(2, 2, 3), recipe(3, 3, 1)];
        let result = Catalog::from_definitions(defs);
        assert!(matches!(result, Err(EconomyError::CycleDetected(_))));
    }

    #[test]
    fn test_self_multiplying_recipe_rejected() {
        let mut defs = minimal_definitions();
        let mut duplicator = recipe(1, 1, 1);
        duplicator.output.quantity = 2;
        defs.recipes = vec![duplicator];
        assert_eq!(
            Catalog::from_definitions(defs).unwrap_err(),
            EconomyError::CycleDetected(1)
        );
    }

    #[test]
    fn test_dangling_zone_item_rejected() {
        let mut defs = minimal_definitions();
        defs.zones[0].items.push(99);
        assert_eq!(
            Catalog::from_definitions(defs).unwrap_err(),
            EconomyError::not_found(EntityKind::Item, 99u32)
        );
    }

    #[test]
    fn test_zone_multipliers_must_not_decrease() {
        let mut defs = minimal_definitions();
        let mut harder = defs.zones[0].clone();
        harder.id = 2;
        harder.name = "Swamp".to_string();
        harder.tier = 2;
        harder.value_multiplier = 0.8;
        defs.zones.push(harder);
        assert!(matches!(
            Catalog::from_definitions(defs),
            Err(EconomyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_non_finite_zone_multipliers_rejected() {
        for bad in [f64::NAN, f64::INFINITY] {
            let mut defs = minimal_definitions();
            defs.zones[0].value_multiplier = bad;
            assert!(matches!(
                Catalog::from_definitions(defs),
                Err(EconomyError::InvalidConfig(_))
            ));

            let mut defs = minimal_definitions();
            defs.zones[0].xp_multiplier = bad;
            assert!(matches!(
                Catalog::from_definitions(defs),
                Err(EconomyError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_probability_out_of_range_rejected() {
        let mut defs = minimal_definitions();
        defs.rarities[0].drop_rate = 1.5;
        assert!(matches!(
            Catalog::from_definitions(defs),
            Err(EconomyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut defs = minimal_definitions();
        let copy = defs.items[0].clone();
        defs.items.push(copy);
        assert!(matches!(
            Catalog::from_definitions(defs),
            Err(EconomyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rarity_step_up_saturates() {
        assert_eq!(Rarity::Common.step_up(), Rarity::Uncommon);
        assert_eq!(Rarity::Mythic.step_up(), Rarity::Mythic);
    }
}
