//! Possession timeline reconstruction.
//!
//! Turns one drug's dispenses into half-open covered/uncovered intervals that
//! tile the observation window, and into a day-by-day supply-on-hand curve.
//! Supply carries forward: a refill handed over while supply remains extends
//! the coverage end instead of restarting it.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::DispenseRecord;

use super::types::{PossessionInterval, TimelinePoint};

/// The span of days analysed for one drug: `[start, end)`, at least one day long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
}

impl ObservationWindow {
    /// Window from the first dispense to the earlier of the horizon end and `as_of`.
    pub fn new(first_dispense: NaiveDate, horizon_days: u32, as_of: NaiveDate) -> Self {
        let horizon_end = add_days(first_dispense, horizon_days);
        let end = horizon_end.min(as_of).max(add_days(first_dispense, 1));
        let days = days_between(first_dispense, end);
        Self {
            start: first_dispense,
            end,
            days,
        }
    }

    pub fn date_at(&self, offset: u32) -> NaiveDate {
        add_days(self.start, offset)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

/// Reconstructed coverage for one drug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PossessionTimeline {
    pub window: Option<ObservationWindow>,
    /// Alternating covered/uncovered intervals tiling the window, in date order.
    pub intervals: Vec<PossessionInterval>,
    /// First day without supply once all fills are consumed, ignoring the window.
    pub coverage_end: Option<NaiveDate>,
    /// Some fill was handed over on or after the window end.
    pub refilled_after_window: bool,
}

impl PossessionTimeline {
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn covered_days(&self) -> u32 {
        self.intervals.iter().filter(|i| i.covered).map(|i| i.days).sum()
    }

    pub fn uncovered_days(&self) -> u32 {
        self.intervals.iter().filter(|i| !i.covered).map(|i| i.days).sum()
    }
}

/// Rebuilds the coverage intervals for one drug's dispenses (any order).
///
/// Each fill extends coverage to `max(coverage_end, dispensed_on) + days_supply`.
/// A fill handed over after the coverage end leaves an uncovered interval
/// `[coverage_end, dispensed_on)`. Intervals are clipped to the window and a trailing
/// uncovered interval runs to the window end when supply ran out before it.
pub fn reconstruct(
    records: &[DispenseRecord],
    horizon_days: u32,
    as_of: NaiveDate,
) -> PossessionTimeline {
    let mut fills: Vec<(NaiveDate, u32)> = records
        .iter()
        .map(|r| (r.dispensed_on, r.days_supply))
        .collect();
    fills.sort_by_key(|(date, _)| *date);

    let Some(&(first, _)) = fills.first() else {
        return PossessionTimeline::default();
    };
    let window = ObservationWindow::new(first, horizon_days, as_of);

    let mut raw_intervals: Vec<(NaiveDate, NaiveDate, bool)> = Vec::new();
    let mut run_start = first;
    let mut coverage_end = first;

    for (dispensed_on, days_supply) in fills.iter().copied() {
        if dispensed_on > coverage_end {
            raw_intervals.push((run_start, coverage_end, true));
            raw_intervals.push((coverage_end, dispensed_on, false));
            run_start = dispensed_on;
            coverage_end = dispensed_on;
        }
        coverage_end = add_days(coverage_end.max(dispensed_on), days_supply);
    }
    raw_intervals.push((run_start, coverage_end, true));

    let mut intervals: Vec<PossessionInterval> = raw_intervals
        .into_iter()
        .filter(|(start, _, _)| *start < window.end)
        .map(|(start, end, covered)| {
            let end = end.min(window.end);
            PossessionInterval {
                start_date: start,
                end_date: end,
                days: days_between(start, end),
                covered,
            }
        })
        .filter(|i| i.days > 0)
        .collect();

    let tiled_to = intervals.last().map(|i| i.end_date).unwrap_or(window.start);
    if tiled_to < window.end {
        intervals.push(PossessionInterval {
            start_date: tiled_to,
            end_date: window.end,
            days: days_between(tiled_to, window.end),
            covered: false,
        });
    }

    PossessionTimeline {
        window: Some(window),
        intervals,
        coverage_end: Some(coverage_end),
        refilled_after_window: fills.iter().any(|(date, _)| *date >= window.end),
    }
}

/// Days of supply on hand for each of `days` consecutive days from `start`.
///
/// `on_hand(t) = max(on_hand(t - 1) - 1, 0) + supplied(t)`; a day is covered when
/// `on_hand(t) > 0`.
pub fn daily_on_hand(records: &[DispenseRecord], start: NaiveDate, days: u32) -> Vec<u32> {
    let supplied = supply_by_day(records, start, days);

    let mut on_hand = Vec::with_capacity(days as usize);
    let mut carried: u64 = 0;
    for offset in 0..days {
        let today = carried.saturating_add(supplied.get(&offset).copied().unwrap_or(0));
        on_hand.push(u32::try_from(today).unwrap_or(u32::MAX));
        carried = today.saturating_sub(1);
    }
    on_hand
}

/// Day-resolution possession curve over the observation window.
pub fn possession_curve(records: &[DispenseRecord], window: &ObservationWindow) -> Vec<TimelinePoint> {
    daily_on_hand(records, window.start, window.days)
        .into_iter()
        .enumerate()
        .map(|(offset, days_on_hand)| TimelinePoint {
            date: window.date_at(offset as u32),
            days_on_hand,
        })
        .collect()
}

/// Total days supplied per day offset from `start`, for offsets in `[0, days)`.
/// Sums saturate at `u64::MAX`.
pub(crate) fn supply_by_day(
    records: &[DispenseRecord],
    start: NaiveDate,
    days: u32,
) -> BTreeMap<u32, u64> {
    let mut supplied = BTreeMap::new();
    for record in records {
        if record.dispensed_on < start {
            continue;
        }
        let offset = days_between(start, record.dispensed_on);
        if offset < days {
            let total = supplied.entry(offset).or_insert(0u64);
            *total = total.saturating_add(u64::from(record.days_supply));
        }
    }
    supplied
}

pub(crate) fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Whole days from `from` to `to`; zero when `to` is not after `from`.
pub(crate) fn days_between(from: NaiveDate, to: NaiveDate) -> u32 {
    u32::try_from((to - from).num_days().max(0)).unwrap_or(u32::MAX)
}
