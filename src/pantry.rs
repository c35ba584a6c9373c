use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::canonical::canonical_name;
use crate::recipe::Recipe;

/// One canonical ingredient and the dishes that use it, in first-seen order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StandardizedIngredient {
    pub name: String,
    pub recipes_using: Vec<String>,
}

/// Canonical ingredient name -> dishes using it. Derived from a snapshot, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PantryIndex {
    entries: IndexMap<String, Vec<String>>,
}

impl PantryIndex {
    /// Fold `recipes` into an index. Recipes and their ingredients are visited in
    /// order, so both the keys and each usage list keep first-occurrence order.
    /// Dish names, not recipe ids, are deduplicated: two recipes called "Soup"
    /// show up once.
    pub fn build(recipes: &[Recipe]) -> Self {
        let mut entries: IndexMap<String, Vec<String>> = IndexMap::new();
        for recipe in recipes {
            for ingredient in &recipe.ingredients {
                let users = entries.entry(canonical_name(&ingredient.name)).or_default();
                if !users.iter().any(|dish| dish == &recipe.dish_name) {
                    users.push(recipe.dish_name.clone());
                }
            }
        }
        tracing::debug!(
            recipes = recipes.len(),
            ingredients = entries.len(),
            "Rebuilt pantry index"
        );
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dishes using the ingredient whose canonical name matches `name`.
    pub fn recipes_using(&self, name: &str) -> Option<&[String]> {
        self.entries.get(&canonical_name(name)).map(Vec::as_slice)
    }

    /// Canonical names in first-occurrence order. Fed to extraction so the model
    /// reuses names already in the pantry.
    pub fn canonical_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn ingredients(&self) -> Vec<StandardizedIngredient> {
        self.entries
            .iter()
            .map(|(name, users)| StandardizedIngredient {
                name: name.clone(),
                recipes_using: users.clone(),
            })
            .collect()
    }

    pub fn as_map(&self) -> &IndexMap<String, Vec<String>> {
        &self.entries
    }
}
