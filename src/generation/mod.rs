//! Generation stages: counter de-accumulation and 15-minute alignment.

pub mod align;
pub mod inverter;

pub use align::{floor_to_slot, resample_15min};
pub use inverter::deaccumulate;
