//! End-to-end settlement run: inputs in, every stage's table out.
//!
//! Stages run strictly in sequence and each materialises its full output
//! before the next starts. Nothing touches the table store here; see
//! [`crate::io::export`] for the store boundary.

use tracing::{info, warn};

use crate::config::SettlementConfig;
use crate::consumption::{
    ZeroOutRule, aggregate_daily, build_profile, consolidate, expand_to_quarter_hours,
    merge_to_tod, split_to_hourly, tag_hourly,
};
use crate::error::{Result, SettlementError};
use crate::generation::{deaccumulate, resample_15min};
use crate::settlement::{
    AllocationEngine, BankingPolicy, RunSummary, TariffRates, aggregate_monthly, apply_banking,
    compute_savings, settle_matched, to_hourly,
};
use crate::site::SiteRegistry;
use crate::types::{
    AllocationRecord, BankingSettlement, DailyConsumption, GenerationReading, GenerationRecord,
    HourlyAllocation, MeterReading, MonthlySettlement, ProfileRow, QuarterHourConsumption,
    SavingsRow, SettlementRecord, SiteHourlyConsumption, SiteTotal, TaggedHourlyConsumption,
    TodAggregate,
};
use crate::validate;

/// Table keys read from and written to a [`crate::io::TableStore`].
pub mod keys {
    pub const REFERENCE_CONSUMPTION: &str = "reference_consumption";
    pub const SITE_TOTALS: &str = "site_totals";
    pub const GENERATION: &str = "generation";

    pub const PROFILE: &str = "profile";
    pub const SITE_HOURLY: &str = "site_hourly";
    pub const HOURLY_TAGGED: &str = "hourly_tagged";
    pub const TOD: &str = "tod";
    pub const QUARTER_HOUR: &str = "quarter_hour";
    pub const DAILY: &str = "daily";
    pub const GENERATION_15MIN: &str = "generation_15min";
    pub const ALLOCATION_15MIN: &str = "allocation_15min";
    pub const ALLOCATION_HOURLY: &str = "allocation_hourly";
    pub const MATCHED_SETTLEMENT: &str = "matched_settlement";
    pub const MONTHLY: &str = "monthly";
    pub const BANKING_SETTLEMENT: &str = "banking_settlement";
    pub const MONTHLY_SAVINGS: &str = "monthly_savings";

    /// Every output key in stage order.
    pub const OUTPUTS: &[&str] = &[
        PROFILE,
        SITE_HOURLY,
        HOURLY_TAGGED,
        TOD,
        QUARTER_HOUR,
        DAILY,
        GENERATION_15MIN,
        ALLOCATION_15MIN,
        ALLOCATION_HOURLY,
        MATCHED_SETTLEMENT,
        MONTHLY,
        BANKING_SETTLEMENT,
        MONTHLY_SAVINGS,
    ];
}

/// Caller-supplied input tables.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    /// Reference-site meter readings for one month.
    pub reference: Vec<MeterReading>,
    /// Declared period totals per site.
    pub site_totals: Vec<SiteTotal>,
    /// Raw generation readings.
    pub generation: Vec<GenerationReading>,
}

/// Every table a run produces, in stage order.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub profile: Vec<ProfileRow>,
    pub site_hourly: Vec<SiteHourlyConsumption>,
    pub hourly_tagged: Vec<TaggedHourlyConsumption>,
    pub tod: Vec<TodAggregate>,
    pub quarter_hour: Vec<QuarterHourConsumption>,
    pub daily: Vec<DailyConsumption>,
    pub generation_15min: Vec<GenerationRecord>,
    pub allocation_15min: Vec<AllocationRecord>,
    pub allocation_hourly: Vec<HourlyAllocation>,
    pub matched_settlement: Vec<SettlementRecord>,
    pub monthly: Vec<MonthlySettlement>,
    pub banking_settlement: Vec<BankingSettlement>,
    pub monthly_savings: Vec<SavingsRow>,
    pub summary: RunSummary,
}

/// A validated configuration ready to settle input tables.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: SettlementConfig,
    registry: SiteRegistry,
}

impl Pipeline {
    /// Validates `config` and builds its site registry.
    ///
    /// # Errors
    ///
    /// Returns the first [`crate::config::ConfigError`] found; every error
    /// is logged.
    pub fn new(config: SettlementConfig) -> Result<Self> {
        let mut errors = config.validate();
        for e in &errors {
            warn!(field = %e.field, "{}", e.message);
        }
        if !errors.is_empty() {
            return Err(SettlementError::Config(errors.swap_remove(0)));
        }
        let registry = config.registry();
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    /// Runs every stage over `inputs`.
    ///
    /// The pipeline's own registry is left untouched; sites admitted under
    /// the tag policy only exist for this run.
    ///
    /// # Errors
    ///
    /// Any stage error aborts the run; no partial output is returned.
    pub fn run(&self, inputs: &PipelineInputs) -> Result<PipelineOutput> {
        let cfg = &self.config;
        let mut registry = self.registry.clone();

        let totals = resolve_site_totals(&mut registry, &inputs.site_totals)?;
        let zero_out = resolve_zero_out(&mut registry, cfg)?;
        let reference_site = registry
            .resolve(&cfg.profile.reference_site, "profile.reference_site")?
            .key
            .clone();

        let profile = build_profile(&inputs.reference, cfg.profile.percentage_tolerance)?;
        info!(site = %reference_site, hours = profile.len(), "built reference profile");

        let site_hourly = consolidate(split_to_hourly(&profile, &totals, &zero_out)?);
        let hourly_tagged = tag_hourly(&site_hourly, &cfg.tod.tagging);
        let tod = merge_to_tod(&site_hourly, &cfg.tod.merge);
        let quarter_hour = expand_to_quarter_hours(&hourly_tagged);
        let daily = aggregate_daily(&site_hourly);
        info!(
            hourly = site_hourly.len(),
            tod = tod.len(),
            quarter_hour = quarter_hour.len(),
            daily = daily.len(),
            "consumption stages complete"
        );

        let generation_15min = if cfg.generation.cumulative {
            resample_15min(&deaccumulate(&inputs.generation)?)?
        } else {
            resample_15min(&inputs.generation)?
        };

        let engine = AllocationEngine::new(&registry, cfg.allocation.surplus_policy);
        let allocation_15min = engine.allocate(&quarter_hour, &generation_15min)?;
        let allocation_hourly = to_hourly(&allocation_15min);
        let matched_settlement = settle_matched(&allocation_15min);
        let monthly = aggregate_monthly(&matched_settlement);
        let banking_settlement =
            apply_banking(&monthly, &registry, &BankingPolicy::from(&cfg.banking))?;
        let monthly_savings = compute_savings(
            &banking_settlement,
            &registry,
            &TariffRates::from(&cfg.tariff),
        )?;
        let summary =
            RunSummary::from_tables(&generation_15min, &banking_settlement, &monthly_savings);
        info!(
            months = summary.months.len(),
            sites = summary.sites,
            "settlement stages complete"
        );

        Ok(PipelineOutput {
            profile,
            site_hourly,
            hourly_tagged,
            tod,
            quarter_hour,
            daily,
            generation_15min,
            allocation_15min,
            allocation_hourly,
            matched_settlement,
            monthly,
            banking_settlement,
            monthly_savings,
            summary,
        })
    }
}

fn resolve_site_totals(
    registry: &mut SiteRegistry,
    site_totals: &[SiteTotal],
) -> Result<Vec<(String, f64)>> {
    validate::non_empty(site_totals, keys::SITE_TOTALS)?;
    validate::finite_non_negative(
        keys::SITE_TOTALS,
        "consumption_kwh",
        site_totals.iter().map(|t| t.consumption_kwh),
    )?;

    let mut totals = Vec::with_capacity(site_totals.len());
    for t in site_totals {
        let key = registry.resolve(&t.site, keys::SITE_TOTALS)?.key.clone();
        totals.push((key, t.consumption_kwh));
    }
    validate::unique(keys::SITE_TOTALS, totals.iter().map(|(key, _)| key.as_str()))?;
    Ok(totals)
}

fn resolve_zero_out(
    registry: &mut SiteRegistry,
    cfg: &SettlementConfig,
) -> Result<Vec<ZeroOutRule>> {
    let mut rules = Vec::with_capacity(cfg.zero_out.len());
    for rule in &cfg.zero_out {
        let key = registry.resolve(&rule.site, "zero_out")?.key.clone();
        let hours = rule.parsed_hours().map_err(|bad| {
            SettlementError::Config(crate::config::ConfigError {
                field: "zero_out.hours".to_string(),
                message: format!("\"{bad}\" is not a timestamp"),
            })
        })?;
        rules.push(ZeroOutRule::new(key, hours));
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::site::{TariffTier, UnmappedPolicy};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("timestamp")
    }

    fn two_site_config() -> SettlementConfig {
        let mut cfg = SettlementConfig::baseline();
        cfg.sites = vec![
            SiteConfig {
                name: "Alpha".to_string(),
                code: "A-1".to_string(),
                tariff: TariffTier::High,
            },
            SiteConfig {
                name: "Beta".to_string(),
                code: "B-2".to_string(),
                tariff: TariffTier::Low,
            },
        ];
        cfg.profile.reference_site = "Alpha".to_string();
        cfg.allocation.priority = vec!["ALPHA".to_string()];
        cfg.zero_out.clear();
        cfg
    }

    fn inputs(hours: i64) -> PipelineInputs {
        PipelineInputs {
            reference: (0..hours)
                .map(|h| MeterReading {
                    timestamp: start() + Duration::hours(h),
                    consumption_kwh: 1.0,
                })
                .collect(),
            site_totals: vec![
                SiteTotal {
                    site: "alpha".to_string(),
                    consumption_kwh: hours as f64,
                },
                SiteTotal {
                    site: "Beta".to_string(),
                    consumption_kwh: 2.0 * hours as f64,
                },
            ],
            generation: (0..hours * 4)
                .map(|q| GenerationReading {
                    timestamp: start() + Duration::minutes(15 * q),
                    generation_kwh: 0.5,
                    source: None,
                })
                .collect(),
        }
    }

    #[test]
    fn invalid_config_rejected() {
        let mut cfg = two_site_config();
        cfg.banking.credit_factor = 0.0;
        assert!(matches!(Pipeline::new(cfg), Err(SettlementError::Config(_))));
    }

    #[test]
    fn runs_every_stage() {
        let pipeline = Pipeline::new(two_site_config()).expect("pipeline");
        let out = pipeline.run(&inputs(24)).expect("run");
        assert_eq!(out.profile.len(), 24);
        assert_eq!(out.site_hourly.len(), 48);
        assert_eq!(out.quarter_hour.len(), 192);
        assert_eq!(out.generation_15min.len(), 96);
        assert_eq!(out.allocation_15min.len(), 192);
        assert_eq!(out.monthly.len(), 2);
        assert_eq!(out.banking_settlement.len(), 2);
        assert_eq!(out.monthly_savings.len(), 2);
        assert!(out.site_hourly.iter().all(|r| r.site == "ALPHA (A-1)" || r.site == "BETA (B-2)"));
    }

    #[test]
    fn priority_site_is_fully_served() {
        // Alpha needs 0.25 kWh per slot and Beta 0.5; generation is 0.5.
        let pipeline = Pipeline::new(two_site_config()).expect("pipeline");
        let out = pipeline.run(&inputs(4)).expect("run");
        for r in out.allocation_15min.iter().filter(|r| r.site == "ALPHA (A-1)") {
            assert!((r.generation_kwh - r.consumption_kwh).abs() < 1e-9);
            assert_eq!(r.surplus_demand_kwh, 0.0);
        }
    }

    #[test]
    fn unmapped_site_fails_by_default() {
        let pipeline = Pipeline::new(two_site_config()).expect("pipeline");
        let mut input = inputs(4);
        input.site_totals[1].site = "Gamma".to_string();
        let err = pipeline.run(&input);
        assert!(matches!(err, Err(SettlementError::UnmappedSite { .. })));
    }

    #[test]
    fn unmapped_site_tagged_when_configured() {
        let mut cfg = two_site_config();
        cfg.resolution.unmapped = UnmappedPolicy::Tag;
        let pipeline = Pipeline::new(cfg).expect("pipeline");
        let mut input = inputs(4);
        input.site_totals[1].site = "Gamma".to_string();
        let out = pipeline.run(&input).expect("run");
        assert!(out.monthly.iter().any(|m| m.site == "GAMMA (UNMAPPED)"));
        assert!(pipeline.registry().get("GAMMA (UNMAPPED)").is_none());
    }

    #[test]
    fn duplicate_site_totals_rejected() {
        let pipeline = Pipeline::new(two_site_config()).expect("pipeline");
        let mut input = inputs(4);
        input.site_totals[1].site = "ALPHA".to_string();
        assert!(matches!(
            pipeline.run(&input),
            Err(SettlementError::DataQuality { .. })
        ));
    }

    #[test]
    fn cumulative_generation_is_deaccumulated() {
        let mut cfg = two_site_config();
        cfg.generation.cumulative = true;
        let pipeline = Pipeline::new(cfg).expect("pipeline");
        let mut input = inputs(4);
        for (i, g) in input.generation.iter_mut().enumerate() {
            g.generation_kwh = 0.5 * (i as f64 + 1.0);
            g.source = Some("INV_1".to_string());
        }
        let out = pipeline.run(&input).expect("run");
        assert!(out.generation_15min.iter().all(|g| (g.generation_kwh - 0.5).abs() < 1e-9));
    }
}
