//! Moving pipeline tables across the [`TableStore`] boundary.

use std::fs;
use std::path::Path;

use tracing::{error, info};

use super::TableStore;
use crate::error::Result;
use crate::pipeline::{PipelineInputs, PipelineOutput, keys};
use crate::settlement::RunSummary;

/// Reads the three input tables.
///
/// # Errors
///
/// Returns [`crate::error::SettlementError::MissingTable`] or a schema or
/// parse error from the store.
pub fn load_inputs<S: TableStore>(store: &S) -> Result<PipelineInputs> {
    let inputs = PipelineInputs {
        reference: store.read(keys::REFERENCE_CONSUMPTION)?,
        site_totals: store.read(keys::SITE_TOTALS)?,
        generation: store.read(keys::GENERATION)?,
    };
    info!(
        reference = inputs.reference.len(),
        site_totals = inputs.site_totals.len(),
        generation = inputs.generation.len(),
        "loaded input tables"
    );
    Ok(inputs)
}

fn stage_outputs<S: TableStore>(store: &mut S, output: &PipelineOutput) -> Result<()> {
    store.write(keys::PROFILE, &output.profile)?;
    store.write(keys::SITE_HOURLY, &output.site_hourly)?;
    store.write(keys::HOURLY_TAGGED, &output.hourly_tagged)?;
    store.write(keys::TOD, &output.tod)?;
    store.write(keys::QUARTER_HOUR, &output.quarter_hour)?;
    store.write(keys::DAILY, &output.daily)?;
    store.write(keys::GENERATION_15MIN, &output.generation_15min)?;
    store.write(keys::ALLOCATION_15MIN, &output.allocation_15min)?;
    store.write(keys::ALLOCATION_HOURLY, &output.allocation_hourly)?;
    store.write(keys::MATCHED_SETTLEMENT, &output.matched_settlement)?;
    store.write(keys::MONTHLY, &output.monthly)?;
    store.write(keys::BANKING_SETTLEMENT, &output.banking_settlement)?;
    store.write(keys::MONTHLY_SAVINGS, &output.monthly_savings)?;
    Ok(())
}

/// Writes every output table and publishes them together.
///
/// If any write fails the staged tables are discarded and nothing is
/// published.
///
/// # Errors
///
/// Returns the first write or commit error.
pub fn export_outputs<S: TableStore>(store: &mut S, output: &PipelineOutput) -> Result<()> {
    if let Err(e) = stage_outputs(store, output) {
        error!(error = %e, "failed to stage output tables, discarding");
        store.discard();
        return Err(e);
    }
    store.commit()?;
    info!(tables = keys::OUTPUTS.len(), "published output tables");
    Ok(())
}

/// Writes the run summary as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or the file write fails.
pub fn write_summary_json(summary: &RunSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStore;
    use crate::types::SiteTotal;

    #[test]
    fn missing_input_table_reported() {
        let mut store = MemoryStore::new();
        store.insert_csv(keys::SITE_TOTALS, "site,consumption_kwh\nA,1\n");
        let err = load_inputs(&store);
        assert!(matches!(
            err,
            Err(crate::error::SettlementError::MissingTable { ref key })
                if key == keys::REFERENCE_CONSUMPTION
        ));
    }

    #[test]
    fn inputs_round_trip_through_store() {
        let mut store = MemoryStore::new();
        store.insert_csv(
            keys::REFERENCE_CONSUMPTION,
            "timestamp,consumption_kwh\n2025-08-01 00:00:02,1.5\n",
        );
        store.insert_csv(keys::SITE_TOTALS, "site,consumption_kwh\nWhitefield,120\n");
        store.insert_csv(
            keys::GENERATION,
            "timestamp,generation_kwh,source\n01-08-2025 06:15:00,0.4,INV_1\n",
        );
        let inputs = load_inputs(&store).expect("load");
        assert_eq!(inputs.reference[0].consumption_kwh, 1.5);
        assert_eq!(
            inputs.site_totals,
            vec![SiteTotal {
                site: "Whitefield".to_string(),
                consumption_kwh: 120.0
            }]
        );
        assert_eq!(inputs.generation[0].source.as_deref(), Some("INV_1"));
    }

    #[test]
    fn summary_json_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("summary.json");
        let summary = RunSummary::from_tables(&[], &[], &[]);
        write_summary_json(&summary, &path).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        let value: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["sites"], 0);
    }
}
