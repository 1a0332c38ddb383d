//! TOML-based settlement configuration and preset definitions.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consumption::tod::TodBoundaries;
use crate::io::timestamp;
use crate::settlement::allocation::SurplusPolicy;
use crate::site::{SiteRegistry, TariffTier, UnmappedPolicy, normalize_name, priority_rank};

/// Top-level settlement configuration parsed from TOML.
///
/// All fields have defaults matching the baseline preset. Load from
/// TOML with [`SettlementConfig::from_toml_file`] or use
/// [`SettlementConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettlementConfig {
    /// Reference profile parameters.
    pub profile: ProfileConfig,
    /// Registered consumption sites.
    pub sites: Vec<SiteConfig>,
    /// Slot allocation parameters.
    pub allocation: AllocationConfig,
    /// Monthly banking loss factors.
    pub banking: BankingConfig,
    /// Grid and renewable tariff rates.
    pub tariff: TariffConfig,
    /// ToD boundary schemes.
    pub tod: TodConfig,
    /// Generation input handling.
    pub generation: GenerationConfig,
    /// Hours forced to zero consumption per site.
    pub zero_out: Vec<ZeroOutConfig>,
    /// Site name resolution.
    pub resolution: ResolutionConfig,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self::baseline()
    }
}

/// Reference profile parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    /// Site whose metered readings form the reference profile.
    pub reference_site: String,
    /// Allowed deviation of the percentage sum from 100.
    pub percentage_tolerance: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            reference_site: "HRBR Unit".to_string(),
            percentage_tolerance: 1.0,
        }
    }
}

/// One registered site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub name: String,
    /// Regulatory meter code.
    pub code: String,
    #[serde(default)]
    pub tariff: TariffTier,
}

impl SiteConfig {
    fn new(name: &str, code: &str, tariff: TariffTier) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            tariff,
        }
    }
}

/// Slot allocation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationConfig {
    /// Ordered priority name fragments, matched against composite site keys.
    pub priority: Vec<String>,
    /// Site that receives a slot's leftover generation.
    pub surplus_policy: SurplusPolicy,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            priority: ["MALLESWARAM", "SAHAKAR NAGAR", "HRBR UNIT", "OLD AIRPORT ROAD"]
                .into_iter()
                .map(String::from)
                .collect(),
            surplus_policy: SurplusPolicy::default(),
        }
    }
}

/// Monthly banking loss factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BankingConfig {
    /// Pool energy consumed per kWh of demand settled in full.
    pub debit_factor: f64,
    /// Fraction of a partial pool credited to the site.
    pub credit_factor: f64,
}

impl Default for BankingConfig {
    fn default() -> Self {
        Self {
            debit_factor: 1.08,
            credit_factor: 0.92,
        }
    }
}

/// Tariff rates per kWh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffConfig {
    pub high_rate_per_kwh: f64,
    pub low_rate_per_kwh: f64,
    /// Charge for renewable energy delivered through settlement.
    pub renewable_rate_per_kwh: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            high_rate_per_kwh: 7.20,
            low_rate_per_kwh: 5.95,
            renewable_rate_per_kwh: 1.0,
        }
    }
}

/// ToD boundary schemes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TodConfig {
    /// Scheme for hourly slot tagging (inherited by 15-minute rows).
    pub tagging: TodBoundaries,
    /// Scheme for the daily ToD roll-up.
    pub merge: TodBoundaries,
}

impl Default for TodConfig {
    fn default() -> Self {
        Self {
            tagging: TodBoundaries::TAGGING,
            merge: TodBoundaries::MERGE,
        }
    }
}

/// Generation input handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Readings are per-source cumulative day counters rather than interval energy.
    pub cumulative: bool,
}

/// Hours at which a site's consumption is forced to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZeroOutConfig {
    pub site: String,
    /// Timestamps, floored to the hour when matched.
    pub hours: Vec<String>,
}

impl ZeroOutConfig {
    /// Parses `hours`, returning the first entry that is not a timestamp on error.
    pub fn parsed_hours(&self) -> Result<Vec<NaiveDateTime>, String> {
        self.hours
            .iter()
            .map(|h| timestamp::parse(h).ok_or_else(|| h.clone()))
            .collect()
    }
}

/// Site name resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionConfig {
    pub unmapped: UnmappedPolicy,
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"banking.debit_factor"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl SettlementConfig {
    /// Returns the baseline configuration: eleven sites, four priority sites,
    /// tagging and merge ToD schemes kept distinct.
    pub fn baseline() -> Self {
        use TariffTier::{High, Low};
        Self {
            profile: ProfileConfig::default(),
            sites: vec![
                SiteConfig::new("Malleswaram", "C2HT-136", High),
                SiteConfig::new("Electronic City", "S13HT-87", Low),
                SiteConfig::new("Kanakapura", "S12HT-99", Low),
                SiteConfig::new("Bellandur", "S11HT-124", Low),
                SiteConfig::new("Sarjapura", "S11HT-419", Low),
                SiteConfig::new("Sahakar Nagar", "C8HT-111", High),
                SiteConfig::new("HRBR Unit", "E8HT-203", High),
                SiteConfig::new("Whitefield", "E4HT-355", Low),
                SiteConfig::new("Bellandur Corp. Office", "S11BHT 406", Low),
                SiteConfig::new("Thanisandra", "C8HT-135", Low),
                SiteConfig::new("Old Airport Road", "E6HT209", High),
            ],
            allocation: AllocationConfig::default(),
            banking: BankingConfig::default(),
            tariff: TariffConfig::default(),
            tod: TodConfig::default(),
            generation: GenerationConfig::default(),
            zero_out: vec![ZeroOutConfig {
                site: "HRBR Unit".to_string(),
                hours: vec![
                    "2025-08-07 18:00:00".to_string(),
                    "2025-08-07 19:00:00".to_string(),
                    "2025-08-07 20:00:00".to_string(),
                ],
            }],
            resolution: ResolutionConfig::default(),
        }
    }

    /// Returns the unified-ToD preset: one boundary scheme for tagging and merging.
    pub fn unified_tod() -> Self {
        Self {
            tod: TodConfig {
                tagging: TodBoundaries::MERGE,
                merge: TodBoundaries::MERGE,
            },
            ..Self::baseline()
        }
    }

    /// Returns the smallest-demand preset: slot remainders land on the
    /// site with the smallest consumption.
    pub fn smallest_demand_surplus() -> Self {
        let mut cfg = Self::baseline();
        cfg.allocation.surplus_policy = SurplusPolicy::SmallestDemand;
        cfg
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "unified_tod", "smallest_demand_surplus"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "unified_tod" => Ok(Self::unified_tod()),
            "smallest_demand_surplus" => Ok(Self::smallest_demand_surplus()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Builds the site registry described by `sites`, `allocation.priority`
    /// and `resolution.unmapped`.
    pub fn registry(&self) -> SiteRegistry {
        SiteRegistry::new(
            self.sites
                .iter()
                .map(|s| (s.name.as_str(), s.code.as_str(), s.tariff)),
            &self.allocation.priority,
            self.resolution.unmapped,
        )
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if !(self.profile.percentage_tolerance >= 0.0) {
            errors.push(ConfigError::new(
                "profile.percentage_tolerance",
                "must be >= 0",
            ));
        }

        let names: Vec<String> = self.sites.iter().map(|s| normalize_name(&s.name)).collect();
        if names.is_empty() {
            errors.push(ConfigError::new("sites", "at least one site is required"));
        }
        let mut seen_names = HashSet::new();
        let mut seen_codes = HashSet::new();
        for (site, name) in self.sites.iter().zip(&names) {
            if name.is_empty() {
                errors.push(ConfigError::new("sites.name", "must not be empty"));
            }
            if site.code.trim().is_empty() {
                errors.push(ConfigError::new(
                    "sites.code",
                    format!("site \"{}\" has an empty code", site.name),
                ));
            }
            if !seen_names.insert(name.clone()) {
                errors.push(ConfigError::new(
                    "sites.name",
                    format!("duplicate site \"{}\"", site.name),
                ));
            }
            if !seen_codes.insert(site.code.trim().to_uppercase()) {
                errors.push(ConfigError::new(
                    "sites.code",
                    format!("duplicate code \"{}\"", site.code),
                ));
            }
        }

        if !names.contains(&normalize_name(&self.profile.reference_site)) {
            errors.push(ConfigError::new(
                "profile.reference_site",
                format!("\"{}\" is not a registered site", self.profile.reference_site),
            ));
        }

        let keys: Vec<String> = self
            .sites
            .iter()
            .zip(&names)
            .map(|(s, name)| format!("{name} ({})", s.code.trim()))
            .collect();
        for (idx, entry) in self.allocation.priority.iter().enumerate() {
            let single = std::slice::from_ref(entry);
            if !keys.iter().any(|k| priority_rank(k, single).is_some()) {
                errors.push(ConfigError::new(
                    format!("allocation.priority[{idx}]"),
                    format!("\"{entry}\" matches no registered site"),
                ));
            }
        }

        let b = &self.banking;
        if !(b.debit_factor > 0.0) {
            errors.push(ConfigError::new("banking.debit_factor", "must be > 0"));
        }
        if !(b.credit_factor > 0.0) {
            errors.push(ConfigError::new("banking.credit_factor", "must be > 0"));
        }

        let t = &self.tariff;
        for (field, rate) in [
            ("tariff.high_rate_per_kwh", t.high_rate_per_kwh),
            ("tariff.low_rate_per_kwh", t.low_rate_per_kwh),
            ("tariff.renewable_rate_per_kwh", t.renewable_rate_per_kwh),
        ] {
            if !(rate > 0.0) {
                errors.push(ConfigError::new(field, "must be > 0"));
            }
        }

        let schemes = [("tod.tagging", &self.tod.tagging), ("tod.merge", &self.tod.merge)];
        for (field, scheme) in schemes {
            if !scheme.is_ordered() {
                errors.push(ConfigError::new(
                    field,
                    "boundaries must be strictly increasing within [0, 24]",
                ));
            }
        }

        for (idx, rule) in self.zero_out.iter().enumerate() {
            if !names.contains(&normalize_name(&rule.site)) {
                errors.push(ConfigError::new(
                    format!("zero_out[{idx}].site"),
                    format!("\"{}\" is not a registered site", rule.site),
                ));
            }
            if let Err(bad) = rule.parsed_hours() {
                errors.push(ConfigError::new(
                    format!("zero_out[{idx}].hours"),
                    format!("\"{bad}\" is not a timestamp"),
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = SettlementConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = SettlementConfig::from_preset("nonexistent");
        let msg = err.map(|_| ()).map_err(|e| e.message).expect_err("should fail");
        assert!(msg.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in SettlementConfig::PRESETS {
            let cfg = SettlementConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn baseline_keeps_schemes_distinct() {
        let cfg = SettlementConfig::baseline();
        assert_eq!(cfg.tod.tagging, TodBoundaries::TAGGING);
        assert_eq!(cfg.tod.merge, TodBoundaries::MERGE);
        let unified = SettlementConfig::unified_tod();
        assert_eq!(unified.tod.tagging, unified.tod.merge);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[banking]
debit_factor = 1.1
"#;
        let cfg = SettlementConfig::from_toml_str(toml).expect("parse");
        assert_eq!(cfg.banking.debit_factor, 1.1);
        assert_eq!(cfg.banking.credit_factor, 0.92);
        assert_eq!(cfg.sites.len(), 11);
        assert_eq!(cfg.tariff.high_rate_per_kwh, 7.20);
    }

    #[test]
    fn full_toml_parses() {
        let toml = r#"
[profile]
reference_site = "Alpha"
percentage_tolerance = 0.5

[[sites]]
name = "Alpha"
code = "A-1"
tariff = "high"

[[sites]]
name = "Beta"
code = "B-2"

[allocation]
priority = ["ALPHA"]
surplus_policy = "smallest_demand"

[tod.tagging]
morning_start = 5
day_start = 9
evening_start = 17
night_start = 23

[generation]
cumulative = true

[[zero_out]]
site = "Beta"
hours = ["2025-08-01 00:00:00"]

[resolution]
unmapped = "tag"
"#;
        let cfg = SettlementConfig::from_toml_str(toml).expect("parse");
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
        assert_eq!(cfg.sites[1].tariff, TariffTier::Low);
        assert_eq!(cfg.allocation.surplus_policy, SurplusPolicy::SmallestDemand);
        assert_eq!(cfg.tod.tagging.night_start, 23);
        assert_eq!(cfg.tod.merge, TodBoundaries::MERGE);
        assert!(cfg.generation.cumulative);
        assert_eq!(cfg.resolution.unmapped, UnmappedPolicy::Tag);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[banking]
debit_factor = 1.08
bogus_field = true
"#;
        assert!(SettlementConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_bad_factors_and_rates() {
        let mut cfg = SettlementConfig::baseline();
        cfg.banking.debit_factor = 0.0;
        cfg.tariff.low_rate_per_kwh = -1.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "banking.debit_factor"));
        assert!(errors.iter().any(|e| e.field == "tariff.low_rate_per_kwh"));
    }

    #[test]
    fn validation_catches_unordered_tod() {
        let mut cfg = SettlementConfig::baseline();
        cfg.tod.merge.day_start = 20;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "tod.merge"));
    }

    #[test]
    fn validation_catches_duplicate_sites_and_codes() {
        let mut cfg = SettlementConfig::baseline();
        cfg.sites.push(SiteConfig::new("whitefield", "NEW-1", TariffTier::Low));
        cfg.sites.push(SiteConfig::new("Yelahanka", "e4ht-355", TariffTier::Low));
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sites.name"));
        assert!(errors.iter().any(|e| e.field == "sites.code"));
    }

    #[test]
    fn validation_catches_dangling_priority_and_zero_out() {
        let mut cfg = SettlementConfig::baseline();
        cfg.allocation.priority.push("NOWHERE".to_string());
        cfg.zero_out[0].hours.push("not a time".to_string());
        cfg.zero_out.push(ZeroOutConfig {
            site: "Atlantis".to_string(),
            hours: Vec::new(),
        });
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "allocation.priority[4]"));
        assert!(errors.iter().any(|e| e.field == "zero_out[0].hours"));
        assert!(errors.iter().any(|e| e.field == "zero_out[1].site"));
    }

    #[test]
    fn registry_ranks_priority_sites() {
        let reg = SettlementConfig::baseline().registry();
        let malleswaram = reg.get("MALLESWARAM (C2HT-136)").expect("site");
        assert_eq!(malleswaram.priority, Some(0));
        let oar = reg.get("OLD AIRPORT ROAD (E6HT209)").expect("site");
        assert_eq!(oar.priority, Some(3));
        assert_eq!(oar.tariff, TariffTier::High);
    }

    #[test]
    fn display_includes_field() {
        let e = ConfigError::new("tariff.high_rate_per_kwh", "must be > 0");
        assert_eq!(e.to_string(), "config error: tariff.high_rate_per_kwh: must be > 0");
    }
}
