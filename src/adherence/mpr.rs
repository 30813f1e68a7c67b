//! Rolling medication-possession-ratio projection.
//!
//! `ratio(t) = supplied_through(t) / (t + 1)` for every day `t` of the horizon,
//! where `supplied_through(t)` is the days-supply handed over on days `0..=t`.
//! Nothing is assumed beyond the last observed fill, so the curve decays after
//! supply runs out. Early fills can push the ratio above 1.0.

use chrono::NaiveDate;

use crate::models::DispenseRecord;

use super::timeline::{add_days, supply_by_day};
use super::types::MprPoint;

pub fn project_mpr(records: &[DispenseRecord], start: NaiveDate, horizon_days: u32) -> Vec<MprPoint> {
    let supplied = supply_by_day(records, start, horizon_days);

    let mut projection = Vec::with_capacity(horizon_days as usize);
    let mut supplied_through: u64 = 0;
    for t in 0..horizon_days {
        supplied_through = supplied_through.saturating_add(supplied.get(&t).copied().unwrap_or(0));
        projection.push(MprPoint {
            date: add_days(start, t),
            ratio: supplied_through as f64 / f64::from(t + 1),
        });
    }
    projection
}

/// Ratio at the end of the observed data: day `observed_days - 1`, capped at the
/// projection length. `None` for an empty projection.
pub fn adherence_score(projection: &[MprPoint], observed_days: u32) -> Option<f64> {
    if projection.is_empty() {
        return None;
    }
    let index = (observed_days.max(1) as usize).min(projection.len()) - 1;
    Some(projection[index].ratio)
}
