use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::domain::{Pair, ReviewEntry, SolveStatus};

/// Response for the review endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    #[serde(rename = "rosterSize")]
    pub roster_size: usize,
    #[serde(rename = "onlyInPreferences")]
    pub only_in_preferences: Vec<String>,
    pub review: Vec<ReviewEntry>,
}

/// Response for the optimise endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimiseResponse {
    #[serde(rename = "runId")]
    pub run_id: uuid::Uuid,
    pub pairs: Vec<Pair>,
    pub unpaired: BTreeSet<String>,
    #[serde(rename = "onlyInPreferences")]
    pub only_in_preferences: Vec<String>,
    #[serde(rename = "totalWeight")]
    pub total_weight: f64,
    pub status: SolveStatus,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}
