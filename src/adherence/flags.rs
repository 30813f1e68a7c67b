use std::cmp::Ordering;

use crate::models::enums::{FlagOrder, RiskLevel};
use crate::models::DispenseRecord;

use super::gaps::longest_gap_days;
use super::settings::RiskThresholds;
use super::timeline::add_days;
use super::types::{Gap, MedicationFlag};

pub fn classify_risk(score: f64, thresholds: &RiskThresholds) -> RiskLevel {
    if score < thresholds.high_below {
        RiskLevel::High
    } else if score < thresholds.low_at_or_above {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Builds the summary row for one drug; `None` when `records` is empty.
/// Fills handed over on the last fill date are summed for the next expected fill.
pub fn summarize(
    drug_name: &str,
    records: &[DispenseRecord],
    gaps: &[Gap],
    adherence_score: f64,
    drug_class: &str,
    thresholds: &RiskThresholds,
) -> Option<MedicationFlag> {
    let last_fill_date = records.iter().map(|r| r.dispensed_on).max()?;
    let last_supply: u32 = records
        .iter()
        .filter(|r| r.dispensed_on == last_fill_date)
        .fold(0u32, |total, r| total.saturating_add(r.days_supply));

    Some(MedicationFlag {
        drug_name: drug_name.to_string(),
        adherence_score,
        risk_level: classify_risk(adherence_score, thresholds),
        last_fill_date,
        next_expected_fill_date: add_days(last_fill_date, last_supply),
        drug_class: drug_class.to_string(),
        fill_count: records.len(),
        gap_count: gaps.len(),
        longest_gap_days: longest_gap_days(gaps),
    })
}

/// Stable sort; ties keep first-appearance order.
pub fn sort_flags(flags: &mut [MedicationFlag], order: FlagOrder) {
    match order {
        FlagOrder::FirstAppearance => {}
        FlagOrder::DrugName => flags.sort_by(|a, b| a.drug_name.cmp(&b.drug_name)),
        FlagOrder::AdherenceScore => {
            flags.sort_by(|a, b| a.adherence_score.total_cmp(&b.adherence_score))
        }
        FlagOrder::RiskLevel => flags.sort_by(|a, b| {
            a.risk_level
                .cmp(&b.risk_level)
                .then_with(|| a.adherence_score.total_cmp(&b.adherence_score))
        }),
        FlagOrder::DrugClass => flags.sort_by(|a, b| {
            a.drug_class
                .cmp(&b.drug_class)
                .then_with(|| a.drug_name.cmp(&b.drug_name))
        }),
        FlagOrder::LastFillDate => flags.sort_by(|a, b| match a.last_fill_date.cmp(&b.last_fill_date) {
            Ordering::Equal => a.drug_name.cmp(&b.drug_name),
            other => other,
        }),
    }
}
