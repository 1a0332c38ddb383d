//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::SettlementConfig;
use crate::error::Result;

#[derive(Debug, Parser)]
#[command(name = "energy-settlement")]
#[command(about = "Multi-site renewable energy settlement, banking, and savings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Settle the input tables in a directory and write every output table
    Run(RunArgs),
    /// Validate a configuration without running
    Check(ConfigSource),
    /// List built-in presets
    Presets,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory holding reference_consumption.csv, site_totals.csv, generation.csv
    #[arg(long)]
    pub input_dir: PathBuf,

    /// Directory receiving the output tables (created if missing)
    #[arg(long)]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub source: ConfigSource,

    /// Also write the run summary as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

/// Where the configuration comes from. Defaults to the baseline preset.
#[derive(Debug, Args)]
pub struct ConfigSource {
    /// Load configuration from a TOML file
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Use a built-in preset
    #[arg(long)]
    pub preset: Option<String>,
}

impl ConfigSource {
    /// Loads the selected configuration: `--config`, then `--preset`, then baseline.
    ///
    /// # Errors
    ///
    /// Returns a config error if the file cannot be parsed or the preset is unknown.
    pub fn load(&self) -> Result<SettlementConfig> {
        let cfg = if let Some(path) = &self.config {
            SettlementConfig::from_toml_file(path)?
        } else if let Some(name) = &self.preset {
            SettlementConfig::from_preset(name)?
        } else {
            SettlementConfig::baseline()
        };
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_command() {
        let cli = Cli::try_parse_from([
            "energy-settlement",
            "run",
            "--input-dir",
            "in",
            "--output-dir",
            "out",
            "--preset",
            "unified_tod",
        ])
        .expect("parse");
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.input_dir, PathBuf::from("in"));
                assert_eq!(args.source.preset.as_deref(), Some("unified_tod"));
                assert!(args.summary_json.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_and_preset_conflict() {
        let res = Cli::try_parse_from([
            "energy-settlement",
            "check",
            "--config",
            "a.toml",
            "--preset",
            "baseline",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn default_source_is_baseline() {
        let source = ConfigSource {
            config: None,
            preset: None,
        };
        let cfg = source.load().expect("load");
        assert_eq!(cfg.sites.len(), SettlementConfig::baseline().sites.len());
    }

    #[test]
    fn unknown_preset_is_error() {
        let source = ConfigSource {
            config: None,
            preset: Some("nope".to_string()),
        };
        assert!(source.load().is_err());
    }
}
