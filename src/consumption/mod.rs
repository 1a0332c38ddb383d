//! Consumption stages: reference profile, per-site hourly split, ToD
//! tagging and roll-up, 15-minute expansion, and daily totals.

pub mod daily;
pub mod hourly;
pub mod interval;
pub mod profile;
pub mod tod;

pub use daily::aggregate_daily;
pub use hourly::{ZeroOutRule, consolidate, split_to_hourly};
pub use interval::expand_to_quarter_hours;
pub use profile::build_profile;
pub use tod::{TodBoundaries, merge_to_tod, tag_hourly};
