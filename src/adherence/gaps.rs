use crate::models::enums::GapSeverity;

use super::settings::GapSeverityThresholds;
use super::timeline::PossessionTimeline;
use super::types::Gap;

/// Fixed severity policy: `<= minor_max` minor, `<= moderate_max` moderate, else severe.
pub fn classify_gap_severity(gap_days: u32, thresholds: &GapSeverityThresholds) -> GapSeverity {
    if gap_days <= thresholds.minor_max {
        GapSeverity::Minor
    } else if gap_days <= thresholds.moderate_max {
        GapSeverity::Moderate
    } else {
        GapSeverity::Severe
    }
}

/// One gap per uncovered interval of at least one day. Adjacent gaps are never merged.
pub fn detect_gaps(timeline: &PossessionTimeline, thresholds: &GapSeverityThresholds) -> Vec<Gap> {
    let Some(window) = timeline.window else {
        return Vec::new();
    };

    timeline
        .intervals
        .iter()
        .filter(|i| !i.covered && i.days >= 1)
        .map(|i| Gap {
            start_date: i.start_date,
            end_date: i.end_date,
            gap_days: i.days,
            severity: classify_gap_severity(i.days, thresholds),
            open: i.end_date == window.end && !timeline.refilled_after_window,
        })
        .collect()
}

/// Longest gap, in days; zero when there are none.
pub fn longest_gap_days(gaps: &[Gap]) -> u32 {
    gaps.iter().map(|g| g.gap_days).max().unwrap_or(0)
}

/// Most severe classification among `gaps`.
pub fn worst_severity(gaps: &[Gap]) -> Option<GapSeverity> {
    gaps.iter().map(|g| g.severity).max()
}
