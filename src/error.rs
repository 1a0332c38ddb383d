//! Error taxonomy for settlement pipeline runs.
//!
//! Every variant is terminal for the current run: a stage either fully
//! succeeds or aborts, and nothing is written to the output store.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::config::ConfigError;

/// Maximum number of offending rows carried in a data-quality preview.
pub const PREVIEW_ROWS: usize = 5;

/// Errors raised by pipeline stages, input checks, and table I/O.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// A required column is absent from an input table.
    #[error("schema violation in {context}: missing columns {missing:?} (present: {present:?})")]
    Schema {
        context: String,
        missing: Vec<String>,
        present: Vec<String>,
    },

    /// Values violate a precondition (missing, negative, out of tolerance, ...).
    #[error("data quality violation in {context}: {message}{}", format_preview(.preview))]
    DataQuality {
        context: String,
        message: String,
        preview: Vec<String>,
    },

    /// A free-text site name could not be resolved against the site registry.
    #[error("unmapped site \"{name}\" in {context}")]
    UnmappedSite { name: String, context: String },

    /// Allocated generation plus surplus does not tie out to slot generation.
    #[error(
        "conservation violation at {date} {time}: slot generation {generation_kwh} kWh, \
         allocated + surplus {accounted_kwh} kWh"
    )]
    Conservation {
        date: NaiveDate,
        time: NaiveTime,
        generation_kwh: f64,
        accounted_kwh: f64,
    },

    /// A table key was requested that the store does not hold.
    #[error("table \"{key}\" not found in store")]
    MissingTable { key: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("table I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SettlementError {
    /// Builds a data-quality error, keeping at most [`PREVIEW_ROWS`] preview lines.
    pub fn data_quality(
        context: impl Into<String>,
        message: impl Into<String>,
        preview: impl IntoIterator<Item = String>,
    ) -> Self {
        Self::DataQuality {
            context: context.into(),
            message: message.into(),
            preview: preview.into_iter().take(PREVIEW_ROWS).collect(),
        }
    }
}

fn format_preview(preview: &[String]) -> String {
    if preview.is_empty() {
        String::new()
    } else {
        format!("; first offenders: [{}]", preview.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;
