use dotenv::dotenv;
use reqwest::Client;
use serde_json::json;
use std::env;
use std::error::Error;
use std::fmt;

use super::endpoints::{
    ChatCompletionRequest, ChatCompletionResponse, OpenRouterAvailableModel, Provider,
    OPENROUTER_CHAT_URL, OPENROUTER_MODELS,
};

const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_APP_NAME: &str = "RecipePlanner";

#[derive(Debug)]
pub enum ApiConnectionError {
    MissingApiKey(String),
    NetworkError(reqwest::Error),
    SerializationError(serde_json::Error),
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    UnsupportedModel(String),
}

impl fmt::Display for ApiConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiConnectionError::MissingApiKey(key_name) => {
                write!(f, "API key not found in environment: {}", key_name)
            }
            ApiConnectionError::NetworkError(err) => write!(f, "Network error: {}", err),
            ApiConnectionError::SerializationError(err) => {
                write!(f, "Serialization error: {}", err)
            }
            ApiConnectionError::ApiError { status, error_body } => {
                write!(f, "API error {}: {}", status, error_body)
            }
            ApiConnectionError::UnsupportedModel(model) => {
                write!(f, "Model not offered by this provider: {}", model)
            }
        }
    }
}

impl Error for ApiConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ApiConnectionError::NetworkError(err) => Some(err),
            ApiConnectionError::SerializationError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiConnectionError {
    fn from(err: reqwest::Error) -> Self {
        ApiConnectionError::NetworkError(err)
    }
}

impl From<serde_json::Error> for ApiConnectionError {
    fn from(err: serde_json::Error) -> Self {
        ApiConnectionError::SerializationError(err)
    }
}

impl Provider {
    pub fn openrouter(api_key_env_var_name: &str) -> Self {
        dotenv().ok();
        Self::OpenRouter {
            api_key: api_key_env_var_name.to_string(),
            available_models: OPENROUTER_MODELS.to_vec(),
            only_upstreams: Vec::new(),
            site_url: env::var("SITE_URL").unwrap_or_else(|_| DEFAULT_SITE_URL.to_string()),
            app_name: env::var("APP_NAME").unwrap_or_else(|_| DEFAULT_APP_NAME.to_string()),
        }
    }

    /// Restrict OpenRouter to the given upstream providers (e.g. "Cerebras").
    pub fn with_upstreams(self, upstreams: Vec<String>) -> Self {
        match self {
            Provider::OpenRouter {
                api_key,
                available_models,
                site_url,
                app_name,
                ..
            } => Provider::OpenRouter {
                api_key,
                available_models,
                only_upstreams: upstreams,
                site_url,
                app_name,
            },
        }
    }

    pub fn get_available_models(&self) -> Vec<OpenRouterAvailableModel> {
        match self {
            Provider::OpenRouter {
                available_models, ..
            } => available_models.clone(),
        }
    }

    /// Check `model` against the provider's known list. Unknown models are allowed
    /// through with a warning because OpenRouter's catalogue changes often.
    pub fn check_model(&self, model: &str) -> Result<(), ApiConnectionError> {
        if model.trim().is_empty() {
            return Err(ApiConnectionError::UnsupportedModel(model.to_string()));
        }
        if !self.get_available_models().iter().any(|m| m.model_name == model) {
            tracing::warn!(model, "Model is not in the known OpenRouter list");
        }
        Ok(())
    }

    pub async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        match self {
            Provider::OpenRouter {
                api_key: api_key_env_var_name,
                only_upstreams,
                site_url,
                app_name,
                ..
            } => {
                dotenv().ok();
                let actual_api_key = env::var(api_key_env_var_name)
                    .map_err(|_| ApiConnectionError::MissingApiKey(api_key_env_var_name.clone()))?;
                self.check_model(&request.model)?;

                let mut request_payload = serde_json::to_value(&request)?;
                if !only_upstreams.is_empty() {
                    if let Some(obj) = request_payload.as_object_mut() {
                        obj.insert("provider".to_string(), json!({ "only": only_upstreams }));
                    }
                }

                tracing::debug!(model = %request.model, messages = request.messages.len(), "Calling OpenRouter");
                let response = Client::new()
                    .post(OPENROUTER_CHAT_URL)
                    .bearer_auth(actual_api_key)
                    .header("Content-Type", "application/json")
                    .header("HTTP-Referer", site_url)
                    .header("X-Title", app_name)
                    .json(&request_payload)
                    .send()
                    .await?;

                if response.status().is_success() {
                    let chat_response = response.json::<ChatCompletionResponse>().await?;
                    if let Some(usage) = &chat_response.usage {
                        tracing::debug!(total_tokens = usage.total_tokens, "OpenRouter call finished");
                    }
                    Ok(chat_response)
                } else {
                    let status = response.status();
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read error body".to_string());
                    tracing::warn!(%status, "OpenRouter returned an error");
                    Err(ApiConnectionError::ApiError { status, error_body })
                }
            }
        }
    }
}
