use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a stored recipe. Assigned by the store on creation, never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(Uuid);

impl RecipeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecipeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecipeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Identity of the user owning a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Quantity {
    #[serde(default, deserialize_with = "lenient::amount")]
    pub value: f64,
    #[serde(default)]
    pub unit: String,
}

impl Quantity {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// The value as a summable amount: anything negative or non-finite counts as zero.
    pub fn amount(&self) -> f64 {
        lenient::sanitize(self.value)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Ingredient {
    pub name: String,
    /// What a cook reads off while preparing (cups, cloves).
    #[serde(default)]
    pub kitchen: Quantity,
    /// What gets bought (grams, pieces).
    #[serde(default)]
    pub shopping: Quantity,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum StepType {
    #[default]
    Prep,
    #[serde(alias = "cook")]
    Cooking,
    #[serde(alias = "pre_start", alias = "prestart")]
    PreStart,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepType::Prep => "prep",
            StepType::Cooking => "cooking",
            StepType::PreStart => "pre-start",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStep {
    pub instruction: String,
    #[serde(default, deserialize_with = "lenient::whole_number")]
    pub duration_minutes: u32,
    #[serde(rename = "type", default)]
    pub step_type: StepType,
}

impl RecipeStep {
    pub fn new(instruction: impl Into<String>, duration_minutes: u32, step_type: StepType) -> Self {
        Self {
            instruction: instruction.into(),
            duration_minutes,
            step_type,
        }
    }
}

/// A recipe without the fields the store assigns. This is what extraction produces
/// and what `create` accepts.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDraft {
    pub dish_name: String,
    #[serde(default)]
    pub variations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::whole_number")]
    pub servings: u32,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub steps: Vec<RecipeStep>,
    #[serde(default, deserialize_with = "lenient::whole_number")]
    pub total_time_minutes: u32,
    #[serde(default)]
    pub paired_with: BTreeSet<RecipeId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: RecipeId,
    pub owner_id: OwnerId,
    pub timestamp: DateTime<Utc>,
    pub dish_name: String,
    #[serde(default)]
    pub variations: Vec<String>,
    #[serde(default)]
    pub servings: u32,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub steps: Vec<RecipeStep>,
    #[serde(default)]
    pub total_time_minutes: u32,
    #[serde(default)]
    pub paired_with: BTreeSet<RecipeId>,
}

impl Recipe {
    pub fn from_draft(id: RecipeId, owner_id: OwnerId, draft: RecipeDraft, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            timestamp,
            dish_name: draft.dish_name,
            variations: draft.variations,
            servings: draft.servings,
            ingredients: draft.ingredients,
            steps: draft.steps,
            total_time_minutes: draft.total_time_minutes,
            paired_with: draft.paired_with,
        }
    }

    /// True when `name` matches the dish name or one of its variations, ignoring case.
    pub fn answers_to(&self, name: &str) -> bool {
        let needle = name.trim().to_lowercase();
        std::iter::once(&self.dish_name)
            .chain(self.variations.iter())
            .any(|alias| alias.trim().to_lowercase() == needle)
    }

    pub fn pre_start_steps(&self) -> impl Iterator<Item = &RecipeStep> {
        self.steps.iter().filter(|s| s.step_type == StepType::PreStart)
    }
}

/// Find the first recipe in a snapshot answering to `name` (dish name or variation).
pub fn find_by_alias<'a>(recipes: &'a [Recipe], name: &str) -> Option<&'a Recipe> {
    recipes.iter().find(|r| r.answers_to(name))
}

/// Fields to replace on an existing recipe. `None` leaves the stored value untouched.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipePatch {
    pub dish_name: Option<String>,
    pub variations: Option<Vec<String>>,
    pub servings: Option<u32>,
    pub ingredients: Option<Vec<Ingredient>>,
    pub steps: Option<Vec<RecipeStep>>,
    pub total_time_minutes: Option<u32>,
    pub paired_with: Option<BTreeSet<RecipeId>>,
}

impl RecipePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, recipe: &mut Recipe) {
        if let Some(dish_name) = self.dish_name {
            recipe.dish_name = dish_name;
        }
        if let Some(variations) = self.variations {
            recipe.variations = variations;
        }
        if let Some(servings) = self.servings {
            recipe.servings = servings;
        }
        if let Some(ingredients) = self.ingredients {
            recipe.ingredients = ingredients;
        }
        if let Some(steps) = self.steps {
            recipe.steps = steps;
        }
        if let Some(total) = self.total_time_minutes {
            recipe.total_time_minutes = total;
        }
        if let Some(paired_with) = self.paired_with {
            recipe.paired_with = paired_with;
        }
    }
}

/// Decoders that never fail on a bad number. Model output and older documents
/// carry numbers as strings, nulls or garbage; all of those become zero.
mod lenient {
    use super::*;
    use serde_json::Value;

    pub(super) fn sanitize(value: f64) -> f64 {
        if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        }
    }

    fn number_of(value: &Value) -> f64 {
        let raw = match value {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        sanitize(raw)
    }

    pub(super) fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(number_of(&value))
    }

    pub(super) fn whole_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(number_of(&value).round().min(u32::MAX as f64) as u32)
    }
}
