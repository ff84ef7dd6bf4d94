//! Plant identification via the plant.id v3 API.
//!
//! The upstream payload is loosely shaped (descriptions arrive as plain strings
//! or as localized objects, most detail fields are optional). Everything is
//! projected into [`IdentificationResult`] here so no caller sees the raw shape.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{IdentificationResult, SimilarImage, NO_DESCRIPTION};

pub const DEFAULT_ENDPOINT: &str = "https://plant.id/api/v3/identification";

/// Detail fields requested from the API; these are the ones the projection reads.
pub const DEFAULT_DETAILS: &str = "common_names,url,description";

pub const API_KEY_ENV: &str = "PLANT_ID_API_KEY";

// ============================================================================
// Identifier trait
// ============================================================================

/// Anything that can turn raw image bytes into a species match.
#[async_trait]
pub trait Identifier: Send + Sync {
    /// One attempt per call. Callers decide whether to retry.
    async fn identify(&self, image: &[u8]) -> Result<IdentificationResult, IdentifyError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream error ({status_code}): {body}")]
    Upstream { status_code: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing API key (set identification.api_key or PLANT_ID_API_KEY)")]
    MissingApiKey,

    #[error("Failed to build HTTP client: {0}")]
    ClientSetup(#[source] reqwest::Error),
}

impl IdentifyError {
    /// HTTP status of the upstream rejection, if that is what happened.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            IdentifyError::Upstream { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

// ============================================================================
// Config types
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub endpoint: String,
    /// Comma-separated detail fields; empty omits the query parameter.
    pub details: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: Option<String>) -> Self {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .unwrap_or_default();

        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            details: DEFAULT_DETAILS.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct IdentificationRequest<'a> {
    images: [&'a str; 1],
    classification_level: &'static str,
    similar_images: bool,
}

#[derive(Debug, Deserialize)]
struct IdentificationResponse {
    result: Option<ResponseResult>,
}

#[derive(Debug, Deserialize)]
struct ResponseResult {
    classification: Option<Classification>,
}

#[derive(Debug, Deserialize)]
struct Classification {
    suggestions: Option<Vec<RawSuggestion>>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    name: Option<String>,
    probability: Option<f64>,
    details: Option<RawDetails>,
    similar_images: Option<Vec<RawSimilarImage>>,
}

#[derive(Debug, Deserialize)]
struct RawDetails {
    description: Option<RawDescription>,
    common_names: Option<Vec<String>>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDescription {
    Text(String),
    Localized { value: Option<String> },
    #[allow(dead_code)]
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct RawSimilarImage {
    url: Option<String>,
    similarity: Option<f64>,
}

// ============================================================================
// Parse boundary
// ============================================================================

/// Outcome of reading a 2xx body, resolved immediately into a result or error.
#[derive(Debug)]
enum SuggestionParse {
    Parsed(RawSuggestion),
    Empty,
    Malformed(String),
}

fn parse_suggestion(body: &str) -> SuggestionParse {
    let response: IdentificationResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => return SuggestionParse::Malformed(format!("invalid JSON: {e}")),
    };

    let suggestions = response
        .result
        .and_then(|r| r.classification)
        .and_then(|c| c.suggestions);

    match suggestions {
        None => SuggestionParse::Malformed(
            "missing result.classification.suggestions".to_string(),
        ),
        Some(list) => match list.into_iter().next() {
            Some(first) => SuggestionParse::Parsed(first),
            None => SuggestionParse::Empty,
        },
    }
}

fn resolve_description(description: Option<RawDescription>) -> String {
    match description {
        Some(RawDescription::Text(text)) if !text.is_empty() => text,
        Some(RawDescription::Localized { value: Some(value) }) if !value.is_empty() => value,
        _ => NO_DESCRIPTION.to_string(),
    }
}

fn project(suggestion: RawSuggestion) -> Result<IdentificationResult, IdentifyError> {
    let name = suggestion
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| IdentifyError::MalformedResponse("suggestion has no name".to_string()))?;

    let probability = suggestion.probability.ok_or_else(|| {
        IdentifyError::MalformedResponse("suggestion has no probability".to_string())
    })?;
    if !(0.0..=1.0).contains(&probability) {
        return Err(IdentifyError::MalformedResponse(format!(
            "probability {probability} outside [0, 1]"
        )));
    }

    let (description, common_names, reference_url) = match suggestion.details {
        Some(d) => (
            resolve_description(d.description),
            d.common_names.unwrap_or_default(),
            d.url.unwrap_or_default(),
        ),
        None => (NO_DESCRIPTION.to_string(), Vec::new(), String::new()),
    };

    let similar_images = suggestion
        .similar_images
        .unwrap_or_default()
        .into_iter()
        .filter_map(|img| {
            img.url.map(|url| SimilarImage {
                url,
                similarity: img.similarity,
            })
        })
        .collect();

    Ok(IdentificationResult {
        species_name: name.clone(),
        probability,
        scientific_name: name,
        common_names,
        description,
        reference_url,
        similar_images,
    })
}

/// Turn a successful response body into a result.
pub fn normalize_response(body: &str) -> Result<IdentificationResult, IdentifyError> {
    match parse_suggestion(body) {
        SuggestionParse::Parsed(suggestion) => project(suggestion),
        SuggestionParse::Empty => Err(IdentifyError::MalformedResponse(
            "suggestions list is empty".to_string(),
        )),
        SuggestionParse::Malformed(reason) => Err(IdentifyError::MalformedResponse(reason)),
    }
}

// ============================================================================
// PlantIdClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct PlantIdClient {
    client: Client,
    config: ClientConfig,
}

impl PlantIdClient {
    pub fn new(config: ClientConfig) -> Result<Self, IdentifyError> {
        if config.api_key.is_empty() {
            return Err(IdentifyError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(IdentifyError::ClientSetup)?;

        Ok(Self { client, config })
    }

    /// Create a client against a different endpoint (for testing / staging).
    pub fn with_endpoint(
        mut config: ClientConfig,
        endpoint: String,
    ) -> Result<Self, IdentifyError> {
        config.endpoint = endpoint;
        Self::new(config)
    }

    fn build_request(&self, encoded: &str) -> reqwest::RequestBuilder {
        let body = IdentificationRequest {
            images: [encoded],
            classification_level: "species",
            similar_images: true,
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Api-Key", &self.config.api_key)
            .json(&body);

        if !self.config.details.is_empty() {
            request = request.query(&[("details", self.config.details.as_str())]);
        }

        request
    }
}

#[async_trait]
impl Identifier for PlantIdClient {
    async fn identify(&self, image: &[u8]) -> Result<IdentificationResult, IdentifyError> {
        let encoded = B64.encode(image);

        tracing::debug!(
            endpoint = %self.config.endpoint,
            image_bytes = image.len(),
            "Sending identification request"
        );

        let response = self.build_request(&encoded).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        status = status.as_u16(),
                        error = %e,
                        "Failed to read plant.id error body"
                    );
                    String::new()
                }
            };
            tracing::error!(status = status.as_u16(), body = %body, "plant.id API error");
            return Err(IdentifyError::Upstream {
                status_code: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;

        match normalize_response(&body) {
            Ok(result) => {
                tracing::info!(
                    species = %result.species_name,
                    probability = result.probability,
                    "Plant identified"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unusable identification response");
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "plant.id"
    }
}

// ============================================================================
// TESTS
// ============================================================================
