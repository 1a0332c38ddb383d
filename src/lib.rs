//! Multi-site renewable energy settlement pipeline.
//!
//! Allocates aggregate generation to site consumption per 15-minute slot,
//! computes matched and banked monthly settlement, and prices the result
//! against tiered grid tariffs.

pub mod cli;
pub mod config;
pub mod consumption;
pub mod error;
pub mod generation;
pub mod io;
pub mod numeric;
pub mod pipeline;
pub mod settlement;
pub mod site;
pub mod telemetry;
pub mod types;
pub mod validate;

pub use config::SettlementConfig;
pub use error::{Result, SettlementError};
pub use pipeline::{Pipeline, PipelineInputs, PipelineOutput};
