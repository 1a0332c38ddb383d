//! Small numeric helpers shared by the stages.

/// Absolute tolerance used when tying out energy balances (kWh).
pub const BALANCE_EPSILON_KWH: f64 = 1e-6;

/// Rounds to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whether two energy figures agree within [`BALANCE_EPSILON_KWH`], scaled
/// by magnitude for large totals.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= BALANCE_EPSILON_KWH * a.abs().max(b.abs()).max(1.0)
}
