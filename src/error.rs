use std::path::PathBuf;
use thiserror::Error;

use crate::api_connection::connection::ApiConnectionError;
use crate::recipe::RecipeId;

/// Rejected scheduler input. Nothing is scheduled when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("At least one cook is needed to run a schedule (got {0})")]
    NoCooks(u32),

    #[error("At least one burner is needed to run a schedule (got {0})")]
    NoBurners(u32),

    #[error("No recipes selected: pick at least one recipe to schedule")]
    NoRecipes,

    #[error("Selected recipe {0} is not in the collection")]
    UnknownRecipe(RecipeId),

    #[error("Step {position} of '{dish_name}' can never start: {reason}")]
    UnreachableStep {
        dish_name: String,
        position: usize,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Nothing to extract: the recipe input is empty")]
    EmptyInput,

    #[error("Failed to fetch recipe page '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model request failed: {0}")]
    Api(#[from] ApiConnectionError),

    #[error("Model returned no usable content")]
    EmptyResponse,

    #[error("Model output is not a valid recipe: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
        content: String,
    },

    #[error("Model output has no dish name")]
    MissingDishName,

    #[error("An extraction is already running; wait for it or cancel it first")]
    AlreadyInFlight,

    #[error("Extraction was cancelled")]
    Cancelled,

    #[error("Extraction task failed: {0}")]
    TaskFailed(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Recipe {0} does not exist")]
    NotFound(RecipeId),

    #[error("Failed to read recipe store '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write recipe store '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Recipe store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("A recipe cannot be paired with itself ({0})")]
    SelfPairing(RecipeId),
}
