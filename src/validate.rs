//! Precondition checks on input and intermediate tables.
//!
//! The stages assume their inputs already satisfy these invariants; the
//! pipeline runs the checks up front so that a violation aborts the run
//! before any stage executes. Each check reports at most
//! [`crate::error::PREVIEW_ROWS`] offending rows.

use std::collections::BTreeMap;
use std::fmt::Debug;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::{Result, SettlementError};

/// Fails if `rows` is empty.
pub fn non_empty<T>(rows: &[T], context: &str) -> Result<()> {
    if rows.is_empty() {
        return Err(SettlementError::data_quality(
            context,
            "table is empty",
            Vec::new(),
        ));
    }
    Ok(())
}

/// Fails on NaN/infinite values (treated as missing) or negative values.
///
/// # Arguments
///
/// * `context` - Table name used in the error
/// * `column` - Column name used in the error
/// * `values` - Column values in row order
pub fn finite_non_negative(
    context: &str,
    column: &str,
    values: impl IntoIterator<Item = f64>,
) -> Result<()> {
    let mut missing = Vec::new();
    let mut negative = Vec::new();
    for (idx, value) in values.into_iter().enumerate() {
        if !value.is_finite() {
            missing.push(format!("row {idx}, column '{column}', value {value}"));
        } else if value < 0.0 {
            negative.push(format!("row {idx}, column '{column}', value {value}"));
        }
    }
    if !missing.is_empty() {
        return Err(SettlementError::data_quality(
            context,
            format!("{} missing values in column '{column}'", missing.len()),
            missing,
        ));
    }
    if !negative.is_empty() {
        return Err(SettlementError::data_quality(
            context,
            format!("{} negative values in column '{column}'", negative.len()),
            negative,
        ));
    }
    Ok(())
}

/// Fails unless the values sum to `expected ± tolerance`.
pub fn percentage_sum(
    context: &str,
    values: impl IntoIterator<Item = f64>,
    expected: f64,
    tolerance: f64,
) -> Result<()> {
    let values: Vec<f64> = values.into_iter().collect();
    let total: f64 = values.iter().sum();
    if (total - expected).abs() > tolerance {
        return Err(SettlementError::data_quality(
            context,
            format!("percentages sum to {total:.4}, expected {expected} ± {tolerance}"),
            values.iter().map(|v| format!("{v}")),
        ));
    }
    Ok(())
}

/// Fails if any key appears more than once.
pub fn unique<K: Ord + Debug>(context: &str, keys: impl IntoIterator<Item = K>) -> Result<()> {
    let mut seen: BTreeMap<K, usize> = BTreeMap::new();
    let mut duplicates = Vec::new();
    for (idx, key) in keys.into_iter().enumerate() {
        if let Some(first) = seen.get(&key) {
            duplicates.push(format!("row {idx} duplicates row {first}: {key:?}"));
        } else {
            seen.insert(key, idx);
        }
    }
    if !duplicates.is_empty() {
        return Err(SettlementError::data_quality(
            context,
            format!("{} duplicate keys", duplicates.len()),
            duplicates,
        ));
    }
    Ok(())
}

/// Fails unless every timestamp falls in one calendar month.
pub fn single_month(
    context: &str,
    timestamps: impl IntoIterator<Item = NaiveDateTime>,
) -> Result<()> {
    let mut months: BTreeMap<(i32, u32), Vec<usize>> = BTreeMap::new();
    for (idx, ts) in timestamps.into_iter().enumerate() {
        months.entry((ts.year(), ts.month())).or_default().push(idx);
    }
    if months.len() > 1 {
        return Err(SettlementError::data_quality(
            context,
            format!("data spans {} calendar months", months.len()),
            months.iter().map(|((y, m), rows)| {
                format!("{y}-{m:02}: rows {:?}", &rows[..rows.len().min(5)])
            }),
        ));
    }
    Ok(())
}

/// Fails unless timestamps sit on 15-minute marks and consecutive sorted
/// timestamps are exactly 15 minutes apart.
pub fn quarter_hour_spacing(
    context: &str,
    timestamps: impl IntoIterator<Item = NaiveDateTime>,
) -> Result<()> {
    let mut sorted: Vec<NaiveDateTime> = timestamps.into_iter().collect();
    let misaligned: Vec<String> = sorted
        .iter()
        .enumerate()
        .filter(|(_, ts)| ts.minute() % 15 != 0 || ts.second() != 0 || ts.nanosecond() != 0)
        .map(|(idx, ts)| format!("row {idx}: {ts}"))
        .collect();
    if !misaligned.is_empty() {
        return Err(SettlementError::data_quality(
            context,
            "timestamps not aligned to 15-minute marks",
            misaligned,
        ));
    }

    sorted.sort();
    let gaps: Vec<String> = sorted
        .windows(2)
        .filter(|w| (w[1] - w[0]).num_minutes() != 15 || (w[1] - w[0]).num_seconds() != 900)
        .map(|w| format!("{} -> {}", w[0], w[1]))
        .collect();
    if !gaps.is_empty() {
        return Err(SettlementError::data_quality(
            context,
            "consecutive timestamps are not 15 minutes apart",
            gaps,
        ));
    }
    Ok(())
}
