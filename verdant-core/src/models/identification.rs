use serde::{Deserialize, Serialize};

/// Placeholder used when the upstream suggestion carries no usable description.
pub const NO_DESCRIPTION: &str = "No description available";

/// Normalized best-match species for one identification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentificationResult {
    pub species_name: String,
    pub probability: f64,
    pub scientific_name: String,
    #[serde(default)]
    pub common_names: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub reference_url: String,
    #[serde(default)]
    pub similar_images: Vec<SimilarImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}
