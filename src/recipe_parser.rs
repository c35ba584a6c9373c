use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::api_connection::endpoints::{ChatCompletionRequest, ChatMessage, Provider, ResponseFormat};
use crate::error::ExtractionError;
use crate::recipe::RecipeDraft;

pub const DEFAULT_MODEL: &str = "qwen/qwen3-32b";

/// Page bodies are cut to this many characters before being sent to the model.
const MAX_SOURCE_CHARS: usize = 60_000;

/// Turns free recipe text into a structured draft.
#[async_trait]
pub trait RecipeExtractor: Send + Sync {
    /// `existing_canonical_names` are ingredient names already in the user's pantry;
    /// implementations should steer the result towards reusing them.
    async fn extract(
        &self,
        content: &str,
        existing_canonical_names: &[String],
    ) -> Result<RecipeDraft, ExtractionError>;
}

/// What the user submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeSource {
    Text(String),
    Url(String),
}

impl RecipeSource {
    /// Treat input starting with http(s):// as a URL, anything else as recipe text.
    pub fn from_input(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            RecipeSource::Url(trimmed.to_string())
        } else {
            RecipeSource::Text(raw.to_string())
        }
    }

    /// The text to hand to the extractor. URLs are fetched.
    pub async fn load(&self) -> Result<String, ExtractionError> {
        let content = match self {
            RecipeSource::Text(text) => text.clone(),
            RecipeSource::Url(url) => {
                tracing::info!(%url, "Fetching recipe page");
                let fetch_err = |source: reqwest::Error| ExtractionError::Fetch {
                    url: url.clone(),
                    source,
                };
                reqwest::get(url.as_str())
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(fetch_err)?
                    .text()
                    .await
                    .map_err(fetch_err)?
            }
        };
        if content.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        Ok(truncate_chars(&content, MAX_SOURCE_CHARS))
    }
}

fn truncate_chars(content: &str, max: usize) -> String {
    match content.char_indices().nth(max) {
        Some((cut, _)) => content[..cut].to_string(),
        None => content.to_string(),
    }
}

fn build_system_prompt(existing_canonical_names: &[String]) -> String {
    let known_names = if existing_canonical_names.is_empty() {
        "(none yet)".to_string()
    } else {
        existing_canonical_names.join(", ")
    };
    format!(
        "/no_thinking
You are a recipe extraction assistant. Read the recipe text (or web page) you are given and return it as structured data.
Return a single JSON object and nothing else: no explanations and no markdown fences.
The JSON object must have these properties:
- \"dishName\": the name of the dish.
- \"variations\": an array of other names this dish is known by (may be empty).
- \"servings\": the number of servings as an integer.
- \"ingredients\": an array of objects with
  - \"name\": the ingredient name, singular, without quantities or preparation notes,
  - \"kitchen\": {{ \"value\": number, \"unit\": string }} the amount a cook measures (cups, tbsp, cloves, pieces),
  - \"shopping\": {{ \"value\": number, \"unit\": string }} the same amount expressed for buying it (g, ml, pieces).
- \"steps\": an array of objects with
  - \"instruction\": what to do,
  - \"durationMinutes\": an integer estimate of how long it takes,
  - \"type\": \"prep\" for hands-on work off the heat, \"cooking\" for anything using a burner or oven, \"pre-start\" for things done well ahead such as marinating overnight or soaking.
- \"totalTimeMinutes\": an integer for the whole recipe.

These ingredient names already exist in the user's pantry. When an ingredient is the same thing, use exactly one of these names:
{}

Your response must start with {{ and end with }}.
",
        known_names
    )
}

/// Turn model output into a draft, tolerating code fences and sloppy numbers.
pub fn parse_extraction(raw_content: &str) -> Result<RecipeDraft, ExtractionError> {
    let content = crate::api_connection::endpoints::strip_code_fences(raw_content);
    if content.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    let mut draft: RecipeDraft = serde_json::from_str(content).map_err(|source| ExtractionError::Malformed {
        source,
        content: content.to_string(),
    })?;

    draft.dish_name = draft.dish_name.trim().to_string();
    if draft.dish_name.is_empty() {
        return Err(ExtractionError::MissingDishName);
    }
    draft.variations = draft
        .variations
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && *v != draft.dish_name)
        .collect();
    for ingredient in draft.ingredients.iter_mut() {
        ingredient.name = ingredient.name.trim().to_string();
    }
    // Pairings refer to stored ids; a model cannot know them.
    draft.paired_with.clear();
    if draft.total_time_minutes == 0 {
        draft.total_time_minutes = draft.steps.iter().map(|s| s.duration_minutes).sum();
    }
    Ok(draft)
}

/// Extraction through an OpenRouter chat model.
pub struct OpenRouterExtractor {
    provider: Provider,
    model: String,
}

impl OpenRouterExtractor {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl RecipeExtractor for OpenRouterExtractor {
    async fn extract(
        &self,
        content: &str,
        existing_canonical_names: &[String],
    ) -> Result<RecipeDraft, ExtractionError> {
        if content.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(build_system_prompt(existing_canonical_names)),
                ChatMessage::user(content),
            ],
            response_format: Some(ResponseFormat::json_object()),
            temperature: Some(0.05),
            max_tokens: Some(4096),
        };

        let response = self.provider.call_chat_completion(request).await?;
        let content = response.first_content().ok_or(ExtractionError::EmptyResponse)?;
        tracing::debug!(chars = content.len(), "Received extraction output");

        parse_extraction(&content).inspect_err(|e| {
            tracing::warn!(error = %e, "Could not use extraction output");
        })
    }
}

/// Allows one extraction at a time. A second `begin` while one is running is refused
/// rather than queued.
#[derive(Clone)]
pub struct ExtractionGate {
    permits: Arc<Semaphore>,
}

impl Default for ExtractionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionGate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }

    /// Start extracting `source` on the runtime. The returned handle yields the result
    /// once; dropping it detaches the task, which keeps the gate closed until it ends.
    pub fn begin(
        &self,
        extractor: Arc<dyn RecipeExtractor>,
        source: RecipeSource,
        existing_canonical_names: Vec<String>,
    ) -> Result<PendingExtraction, ExtractionError> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| ExtractionError::AlreadyInFlight)?;

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let content = source.load().await?;
            extractor.extract(&content, &existing_canonical_names).await
        });
        Ok(PendingExtraction { handle })
    }
}

/// An extraction in flight.
pub struct PendingExtraction {
    handle: JoinHandle<Result<RecipeDraft, ExtractionError>>,
}

impl PendingExtraction {
    /// Wait for the outcome.
    pub async fn outcome(self) -> Result<RecipeDraft, ExtractionError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ExtractionError::Cancelled),
            Err(e) => Err(ExtractionError::TaskFailed(e.to_string())),
        }
    }

    /// Abort the extraction. Returns once the task is gone and the gate is open again.
    pub async fn cancel(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}
