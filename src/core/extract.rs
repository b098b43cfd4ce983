use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::core::names::{normalize, NameMatcher};
use crate::models::{PreferenceMap, RosterSet, SurveyRow, MAX_CHOICES};

/// Errors raised while turning survey rows into preferences
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Row {row} is missing column {column:?}")]
    MissingColumn { row: usize, column: String },

    #[error("Row {row} has no student name")]
    BlankName { row: usize },

    #[error("Column layout is invalid: {0}")]
    InvalidColumns(String),
}

/// Survey headers for each logical column
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMap {
    #[serde(default = "default_first_name")]
    pub first_name: String,
    #[serde(default = "default_surname")]
    pub surname: String,
    #[serde(default = "default_choices")]
    pub choices: Vec<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            first_name: default_first_name(),
            surname: default_surname(),
            choices: default_choices(),
        }
    }
}

fn default_first_name() -> String { "Your First Name".to_string() }
fn default_surname() -> String { "Your Surname".to_string() }
fn default_choices() -> Vec<String> {
    (1..=MAX_CHOICES)
        .map(|i| format!("Choice {} (First and Surname)", i))
        .collect()
}

/// Extraction settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub columns: ColumnMap,
    /// Cell values treated as empty, compared case-insensitively
    #[serde(default = "default_placeholders")]
    pub placeholders: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            columns: ColumnMap::default(),
            placeholders: default_placeholders(),
        }
    }
}

fn default_placeholders() -> Vec<String> { vec!["nan".to_string()] }

/// Corrected preferences plus the roster they were resolved against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub preferences: PreferenceMap,
    pub roster: RosterSet,
}

/// Builds a preference map from raw survey rows
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractorConfig,
    matcher: NameMatcher,
}

impl Extractor {
    pub fn new(config: ExtractorConfig, matcher: NameMatcher) -> Result<Self, ExtractError> {
        let choices = config.columns.choices.len();
        if choices == 0 || choices > MAX_CHOICES {
            return Err(ExtractError::InvalidColumns(format!(
                "expected 1 to {} choice columns, got {}",
                MAX_CHOICES, choices
            )));
        }
        Ok(Self { config, matcher })
    }

    /// Extractor for the standard survey layout
    pub fn with_defaults(matcher: NameMatcher) -> Self {
        Self {
            config: ExtractorConfig::default(),
            matcher,
        }
    }

    /// Normalize rows, then fix typos in every choice against the roster
    pub fn extract(&self, rows: &[SurveyRow]) -> Result<Extracted, ExtractError> {
        let raw = self.raw_preferences(rows)?;
        let roster: RosterSet = raw.keys().cloned().collect();

        let preferences = raw
            .into_iter()
            .map(|(student, choices)| {
                let corrected = self.correct_choices(&student, &choices, &roster);
                (student, corrected)
            })
            .collect();

        tracing::info!("Extracted preferences for {} students", roster.len());

        Ok(Extracted { preferences, roster })
    }

    fn raw_preferences(&self, rows: &[SurveyRow]) -> Result<PreferenceMap, ExtractError> {
        let columns = &self.config.columns;
        let mut preferences = PreferenceMap::new();

        for (index, row) in rows.iter().enumerate() {
            let first = cell(row, index, &columns.first_name)?;
            let surname = cell(row, index, &columns.surname)?;
            // Placeholders only mark empty choices; "Nan" is a real first name
            let student = normalize(&format!("{} {}", first, surname));
            if student.is_empty() {
                return Err(ExtractError::BlankName { row: index });
            }

            let mut choices = Vec::with_capacity(columns.choices.len());
            for column in &columns.choices {
                let choice = normalize(cell(row, index, column)?);
                if !self.is_placeholder(&choice) {
                    choices.push(choice);
                }
            }

            if preferences.insert(student.clone(), choices).is_some() {
                tracing::warn!("Student {:?} submitted more than once, keeping row {}", student, index);
            }
        }

        Ok(preferences)
    }

    fn correct_choices(&self, student: &str, choices: &[String], roster: &RosterSet) -> Vec<String> {
        let mut seen = HashSet::new();
        choices
            .iter()
            .map(|choice| self.matcher.correct(choice, roster))
            .filter(|choice| {
                if choice == student {
                    tracing::debug!("Dropping self-reference in choices of {:?}", student);
                    return false;
                }
                seen.insert(choice.clone())
            })
            .collect()
    }

    fn is_placeholder(&self, value: &str) -> bool {
        value.is_empty()
            || self
                .config
                .placeholders
                .iter()
                .any(|p| p.eq_ignore_ascii_case(value))
    }
}

fn cell<'a>(row: &'a SurveyRow, index: usize, column: &str) -> Result<&'a str, ExtractError> {
    match row.get(column) {
        Some(value) => Ok(value.as_deref().unwrap_or("")),
        None => Err(ExtractError::MissingColumn {
            row: index,
            column: column.to_string(),
        }),
    }
}
