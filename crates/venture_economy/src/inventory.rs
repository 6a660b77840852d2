//! # Inventory
//!
//! Item rows keyed by item id. A row exists only while its quantity is above
//! zero; removing the last unit deletes the row.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::{ItemId, RecipeItem};
use crate::error::{EconomyError, EconomyResult, Resource};

/// A player's item rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    rows: BTreeMap<ItemId, u64>,
}

impl Inventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct item rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the inventory holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Quantity held of `item_id`, zero if there is no row.
    #[must_use]
    pub fn count_item(&self, item_id: ItemId) -> u64 {
        self.rows.get(&item_id).copied().unwrap_or(0)
    }

    /// Whether a row exists for `item_id`.
    #[must_use]
    pub fn has_row(&self, item_id: ItemId) -> bool {
        self.rows.contains_key(&item_id)
    }

    /// All rows, ordered by item id.
    pub fn rows(&self) -> impl Iterator<Item = (ItemId, u64)> + '_ {
        self.rows.iter().map(|(&id, &qty)| (id, qty))
    }

    /// Adds `quantity` units of `item_id`.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the row would overflow.
    pub fn add(&mut self, item_id: ItemId, quantity: u64) -> EconomyResult<()> {
        if quantity == 0 {
            return Ok(());
        }
        let row = self.rows.entry(item_id).or_insert(0);
        *row = row.checked_add(quantity).ok_or(EconomyError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Removes `quantity` units of `item_id`, deleting the row at zero.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientResources` if fewer units are held. Nothing changes
    /// in that case.
    pub fn remove(&mut self, item_id: ItemId, quantity: u64) -> EconomyResult<()> {
        let available = self.count_item(item_id);
        if available < quantity {
            return Err(EconomyError::InsufficientResources {
                resource: Resource::Item(item_id),
                required: quantity,
                available,
            });
        }
        let remaining = available - quantity;
        if remaining == 0 {
            self.rows.remove(&item_id);
        } else {
            self.rows.insert(item_id, remaining);
        }
        Ok(())
    }

    /// Checks every requirement without changing anything.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientResources` for the first unmet requirement.
    pub fn check_all(&self, requirements: &[RecipeItem]) -> EconomyResult<()> {
        for requirement in requirements {
            let available = self.count_item(requirement.item_id);
            let required = u64::from(requirement.quantity);
            if available < required {
                return Err(EconomyError::InsufficientResources {
                    resource: Resource::Item(requirement.item_id),
                    required,
                    available,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_count() {
        let mut inventory = Inventory::new();
        inventory.add(101, 3).unwrap();
        inventory.add(101, 2).unwrap();
        assert_eq!(inventory.count_item(101), 5);
        assert_eq!(inventory.row_count(), 1);
    }

    #[test]
    fn test_remove_to_zero_deletes_row() {
        let mut inventory = Inventory::new();
        inventory.add(101, 2).unwrap();
        inventory.remove(101, 2).unwrap();
        assert!(!inventory.has_row(101));
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_remove_too_many_changes_nothing() {
        let mut inventory = Inventory::new();
        inventory.add(101, 1).unwrap();
        let err = inventory.remove(101, 2).unwrap_err();
        assert_eq!(
            err,
            EconomyError::InsufficientResources {
                resource: Resource::Item(101),
                required: 2,
                available: 1,
            }
        );
        assert_eq!(inventory.count_item(101), 1);
    }

    #[test]
    fn test_zero_add_creates_no_row() {
        let mut inventory = Inventory::new();
        inventory.add(7, 0).unwrap();
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_overflow_detected() {
        let mut inventory = Inventory::new();
        inventory.add(1, u64::MAX).unwrap();
        assert_eq!(inventory.add(1, 1), Err(EconomyError::ArithmeticOverflow));
    }
}
