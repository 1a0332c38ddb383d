//! Settlement stages: slot allocation, hourly roll-up, matched settlement,
//! monthly totals, banking, savings, and the run summary.

pub mod allocation;
pub mod banking;
pub mod matched;
pub mod monthly;
pub mod reaggregate;
pub mod savings;
pub mod summary;

pub use allocation::{AllocationEngine, SurplusPolicy, allocate_slot};
pub use banking::{BankingPolicy, apply_banking};
pub use matched::settle_matched;
pub use monthly::{aggregate_monthly, month_key};
pub use reaggregate::to_hourly;
pub use savings::{TariffRates, compute_savings};
pub use summary::RunSummary;
