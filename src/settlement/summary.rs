//! Post-hoc run summary computed from the output tables.

use std::fmt;

use serde::Serialize;

use crate::types::{BankingSettlement, GenerationRecord, SavingsRow};

/// Portfolio-level totals for one pipeline run.
///
/// Computed from the final tables rather than tracked during the run so
/// the report always agrees with what was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Months covered, `YYYY-MM`, ascending.
    pub months: Vec<String>,
    /// Number of distinct sites settled.
    pub sites: usize,
    /// Number of 15-minute generation slots.
    pub generation_slots: usize,
    pub consumption_kwh: f64,
    /// Generation available on the 15-minute grid.
    pub generation_kwh: f64,
    pub matched_settlement_kwh: f64,
    pub banked_settlement_kwh: f64,
    /// Pool left after the last site of each month, summed over months.
    pub residual_surplus_kwh: f64,
    pub unmet_demand_kwh: f64,
    pub grid_cost: f64,
    pub savings_with_banking: f64,
    pub savings_without_banking: f64,
}

impl RunSummary {
    /// Computes the summary from the generation, banking, and savings tables.
    ///
    /// # Arguments
    ///
    /// * `generation` - 15-minute generation slots
    /// * `banking` - Monthly banking settlement rows
    /// * `savings` - Monthly savings rows
    pub fn from_tables(
        generation: &[GenerationRecord],
        banking: &[BankingSettlement],
        savings: &[SavingsRow],
    ) -> Self {
        let mut months: Vec<String> = banking.iter().map(|b| b.month.clone()).collect();
        months.sort();
        months.dedup();
        let mut sites: Vec<&str> = banking.iter().map(|b| b.site.as_str()).collect();
        sites.sort_unstable();
        sites.dedup();

        let residual_surplus_kwh = months
            .iter()
            .map(|m| {
                banking
                    .iter()
                    .filter(|b| &b.month == m)
                    .map(|b| b.surplus_generation_after_banking_kwh)
                    .fold(f64::INFINITY, f64::min)
            })
            .filter(|v| v.is_finite())
            .sum();

        Self {
            sites: sites.len(),
            months,
            generation_slots: generation.len(),
            consumption_kwh: banking.iter().map(|b| b.consumption_kwh).sum(),
            generation_kwh: generation.iter().map(|g| g.generation_kwh).sum(),
            matched_settlement_kwh: banking.iter().map(|b| b.matched_settlement_kwh).sum(),
            banked_settlement_kwh: banking.iter().map(|b| b.settlement_with_banking_kwh).sum(),
            residual_surplus_kwh,
            unmet_demand_kwh: banking
                .iter()
                .map(|b| b.surplus_demand_after_banking_kwh)
                .sum(),
            grid_cost: savings.iter().map(|s| s.grid_cost).sum(),
            savings_with_banking: savings.iter().map(|s| s.savings_with_banking).sum(),
            savings_without_banking: savings.iter().map(|s| s.savings_without_banking).sum(),
        }
    }

    /// Portfolio savings with banking as a percentage of grid cost.
    pub fn savings_pct_with_banking(&self) -> f64 {
        if self.grid_cost > 0.0 {
            100.0 * self.savings_with_banking / self.grid_cost
        } else {
            0.0
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Settlement Summary ---")?;
        writeln!(f, "Months:                {}", self.months.join(", "))?;
        writeln!(f, "Sites:                 {}", self.sites)?;
        writeln!(f, "Generation slots:      {}", self.generation_slots)?;
        writeln!(f, "Consumption:           {:.2} kWh", self.consumption_kwh)?;
        writeln!(f, "Generation:            {:.2} kWh", self.generation_kwh)?;
        writeln!(f, "Matched settlement:    {:.2} kWh", self.matched_settlement_kwh)?;
        writeln!(f, "Banked settlement:     {:.2} kWh", self.banked_settlement_kwh)?;
        writeln!(f, "Residual surplus:      {:.2} kWh", self.residual_surplus_kwh)?;
        writeln!(f, "Unmet demand:          {:.2} kWh", self.unmet_demand_kwh)?;
        writeln!(f, "Grid cost:             {:.2}", self.grid_cost)?;
        writeln!(
            f,
            "Savings with banking:  {:.2} ({:.1}%)",
            self.savings_with_banking,
            self.savings_pct_with_banking()
        )?;
        write!(f, "Savings w/o banking:   {:.2}", self.savings_without_banking)
    }
}
