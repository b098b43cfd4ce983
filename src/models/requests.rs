use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::SurveyRow;

/// Request to review names before optimising
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(max = 10000))]
    pub rows: Vec<SurveyRow>,
    #[serde(default)]
    #[serde(alias = "not_attending", rename = "notAttending")]
    pub not_attending: Vec<String>,
}

/// Request to compute pairs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OptimiseRequest {
    #[validate(length(max = 10000))]
    pub rows: Vec<SurveyRow>,
    #[serde(default)]
    #[serde(alias = "not_attending", rename = "notAttending")]
    pub not_attending: Vec<String>,
    #[serde(default)]
    #[serde(alias = "exclude_missing", rename = "excludeMissing")]
    pub exclude_missing: bool,
}
