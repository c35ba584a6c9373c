use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::canonical::SHOPPING_IDENTITY;
use crate::recipe::{Recipe, RecipeId};

/// One line of the combined shopping list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    /// Name as written on the first occurrence that opened this group.
    pub display_name: String,
    pub value: f64,
    /// Unit as written on the first occurrence.
    pub unit: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    pub items: Vec<ShoppingItem>,
    /// Selected ids with no matching recipe in the lookup.
    pub unknown_recipes: Vec<RecipeId>,
}

impl ShoppingList {
    pub fn total_for(&self, name: &str, unit: &str) -> Option<f64> {
        self.items
            .iter()
            .find(|item| {
                SHOPPING_IDENTITY.same(&item.display_name, name) && SHOPPING_IDENTITY.same(&item.unit, unit)
            })
            .map(|item| item.value)
    }
}

/// Sum shopping quantities over the selected recipes.
///
/// Occurrences are grouped by (name, unit), both compared case-insensitively after
/// trimming. Units are never converted, so "g" and "kg" of the same ingredient are
/// separate lines. Bad values add zero. Groups appear in the order they were first
/// met; totals do not depend on selection order. Selecting a recipe twice counts it once.
pub fn aggregate_shopping_list(selected: &[RecipeId], all_recipes: &[Recipe]) -> ShoppingList {
    let lookup: HashMap<RecipeId, &Recipe> = all_recipes.iter().map(|r| (r.id, r)).collect();

    let mut list = ShoppingList::default();
    let mut group_of: HashMap<(String, String), usize> = HashMap::new();

    let selected: IndexSet<RecipeId> = selected.iter().copied().collect();
    for id in &selected {
        let Some(recipe) = lookup.get(id) else {
            tracing::warn!(recipe_id = %id, "Selected recipe not found in snapshot");
            list.unknown_recipes.push(*id);
            continue;
        };

        for ingredient in &recipe.ingredients {
            let key = (
                SHOPPING_IDENTITY.key(&ingredient.name),
                SHOPPING_IDENTITY.key(&ingredient.shopping.unit),
            );
            let amount = ingredient.shopping.amount();
            match group_of.get(&key) {
                Some(&slot) => list.items[slot].value += amount,
                None => {
                    group_of.insert(key, list.items.len());
                    list.items.push(ShoppingItem {
                        display_name: ingredient.name.trim().to_string(),
                        value: amount,
                        unit: ingredient.shopping.unit.trim().to_string(),
                    });
                }
            }
        }
    }

    list
}
