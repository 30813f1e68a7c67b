use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::{DefectKind, GapSeverity, RiskLevel};
use crate::models::DrugFilter;

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// A half-open run of days `[start_date, end_date)` that is either fully
/// covered by supply on hand or fully uncovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossessionInterval {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: u32,
    pub covered: bool,
}

/// One day of the possession curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    /// Days of supply on hand that day, counting the day itself and any fill handed over that day.
    pub days_on_hand: u32,
}

/// A discontinuity in coverage. `end_date` is exclusive: the first day covered
/// again, or the end of the observation window for an open gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub gap_days: u32,
    pub severity: GapSeverity,
    /// No refill has closed this gap yet.
    pub open: bool,
}

/// One day of the rolling medication-possession-ratio curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MprPoint {
    pub date: NaiveDate,
    pub ratio: f64,
}

/// Day totals for one drug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub window_start: NaiveDate,
    /// Exclusive.
    pub window_end: NaiveDate,
    pub window_days: u32,
    pub covered_days: u32,
    pub gap_days: u32,
    /// First day without supply once every fill is used up (stockpile carried forward).
    pub coverage_end: NaiveDate,
    pub horizon_days: u32,
    pub projected_covered_days: u32,
    pub projected_uncovered_days: u32,
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// Single-row summary per drug, used for listing and sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationFlag {
    pub drug_name: String,
    /// Terminal MPR ratio. Not clamped: values above 1.0 mean over-supply.
    pub adherence_score: f64,
    pub risk_level: RiskLevel,
    pub last_fill_date: NaiveDate,
    pub next_expected_fill_date: NaiveDate,
    pub drug_class: String,
    pub fill_count: usize,
    pub gap_count: usize,
    pub longest_gap_days: u32,
}

/// Full analysis of one drug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdherenceResult {
    pub drug_name: String,
    pub intervals: Vec<PossessionInterval>,
    pub gaps: Vec<Gap>,
    pub refill_timeline: Vec<TimelinePoint>,
    pub mpr_projection: Vec<MprPoint>,
    pub refill_dates: Vec<NaiveDate>,
    pub coverage: CoverageSummary,
    pub flag: MedicationFlag,
}

// ---------------------------------------------------------------------------
// Defects
// ---------------------------------------------------------------------------

/// An input record that was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDefect {
    /// Position in the caller's input list.
    pub index: usize,
    pub id: Option<String>,
    pub drug_name: String,
    pub kind: DefectKind,
    pub detail: String,
}

/// Accounting of every in-scope input record: accepted + defects == total.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefectReport {
    pub total_records: usize,
    pub accepted: usize,
    pub defects: Vec<RecordDefect>,
}

impl DefectReport {
    pub fn skipped(&self) -> usize {
        self.defects.len()
    }

    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }

    pub fn count(&self, kind: DefectKind) -> usize {
        self.defects.iter().filter(|d| d.kind == kind).count()
    }
}

// ---------------------------------------------------------------------------
// AdherenceReport
// ---------------------------------------------------------------------------

/// Everything the presentation layer needs for one patient.
/// Per-drug maps are ordered by drug name so serialized output is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdherenceReport {
    pub as_of: NaiveDate,
    pub drug_filter: DrugFilter,
    pub patient_age_years: u32,
    pub flags: Vec<MedicationFlag>,
    pub gaps: BTreeMap<String, Vec<Gap>>,
    pub refill_timeline: BTreeMap<String, Vec<TimelinePoint>>,
    pub mpr_projection: BTreeMap<String, Vec<MprPoint>>,
    pub refill_dates: BTreeMap<String, Vec<NaiveDate>>,
    pub coverage: BTreeMap<String, CoverageSummary>,
    /// Distinct drug classes present in `flags`, sorted.
    pub drug_classes: Vec<String>,
    pub defects: DefectReport,
}

impl AdherenceReport {
    pub fn empty(
        as_of: NaiveDate,
        drug_filter: DrugFilter,
        patient_age_years: u32,
        defects: DefectReport,
    ) -> Self {
        Self {
            as_of,
            drug_filter,
            patient_age_years,
            flags: Vec::new(),
            gaps: BTreeMap::new(),
            refill_timeline: BTreeMap::new(),
            mpr_projection: BTreeMap::new(),
            refill_dates: BTreeMap::new(),
            coverage: BTreeMap::new(),
            drug_classes: Vec::new(),
            defects,
        }
    }

    /// Assemble the report from per-drug results. `flags` keep the order of `results`.
    pub fn from_results(
        as_of: NaiveDate,
        drug_filter: DrugFilter,
        patient_age_years: u32,
        results: Vec<AdherenceResult>,
        defects: DefectReport,
    ) -> Self {
        let mut report = Self::empty(as_of, drug_filter, patient_age_years, defects);

        for result in results {
            let name = result.drug_name;
            report.gaps.insert(name.clone(), result.gaps);
            report.refill_timeline.insert(name.clone(), result.refill_timeline);
            report.mpr_projection.insert(name.clone(), result.mpr_projection);
            report.refill_dates.insert(name.clone(), result.refill_dates);
            report.coverage.insert(name, result.coverage);
            report.flags.push(result.flag);
        }

        let mut classes: Vec<String> = report.flags.iter().map(|f| f.drug_class.clone()).collect();
        classes.sort();
        classes.dedup();
        report.drug_classes = classes;

        report
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn flag_for(&self, drug_name: &str) -> Option<&MedicationFlag> {
        self.flags.iter().find(|f| f.drug_name == drug_name)
    }

    pub fn to_json(&self) -> Result<String, AdherenceError> {
        serde_json::to_string(self).map_err(|e| AdherenceError::Serialization(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, AdherenceError> {
        serde_json::to_string_pretty(self).map_err(|e| AdherenceError::Serialization(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// AdherenceError
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum AdherenceError {
    #[error("Invalid dispense record at index {index} ({kind}): {detail}")]
    InvalidRecord {
        index: usize,
        kind: DefectKind,
        detail: String,
    },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid birthdate: {0}")]
    InvalidBirthdate(String),

    #[error("Invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Drug class table parse failed: {0}")]
    DrugClassTable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn flag(name: &str, class: &str) -> MedicationFlag {
        MedicationFlag {
            drug_name: name.into(),
            adherence_score: 0.95,
            risk_level: RiskLevel::Low,
            last_fill_date: date(2020, 1, 1),
            next_expected_fill_date: date(2020, 1, 31),
            drug_class: class.into(),
            fill_count: 1,
            gap_count: 0,
            longest_gap_days: 0,
        }
    }

    fn result(name: &str, class: &str) -> AdherenceResult {
        AdherenceResult {
            drug_name: name.into(),
            intervals: vec![],
            gaps: vec![],
            refill_timeline: vec![],
            mpr_projection: vec![],
            refill_dates: vec![date(2020, 1, 1)],
            coverage: CoverageSummary {
                window_start: date(2020, 1, 1),
                window_end: date(2020, 1, 31),
                window_days: 30,
                covered_days: 30,
                gap_days: 0,
                coverage_end: date(2020, 1, 31),
                horizon_days: 365,
                projected_covered_days: 30,
                projected_uncovered_days: 335,
            },
            flag: flag(name, class),
        }
    }

    #[test]
    fn defect_report_counts() {
        let report = DefectReport {
            total_records: 3,
            accepted: 1,
            defects: vec![
                RecordDefect {
                    index: 0,
                    id: None,
                    drug_name: "A".into(),
                    kind: DefectKind::NonPositiveSupply,
                    detail: "0".into(),
                },
                RecordDefect {
                    index: 2,
                    id: Some("rx-9".into()),
                    drug_name: "B".into(),
                    kind: DefectKind::UnparsableDate,
                    detail: "garbage".into(),
                },
            ],
        };
        assert_eq!(report.skipped(), 2);
        assert!(!report.is_clean());
        assert_eq!(report.count(DefectKind::UnparsableDate), 1);
        assert_eq!(report.count(DefectKind::FutureDated), 0);
    }

    #[test]
    fn from_results_keeps_flag_order_and_sorts_classes() {
        let report = AdherenceReport::from_results(
            date(2020, 6, 1),
            DrugFilter::All,
            70,
            vec![result("Zoloft", "Antidepressants"), result("Lipitor", "Statins"), result("Prozac", "Antidepressants")],
            DefectReport::default(),
        );

        let names: Vec<_> = report.flags.iter().map(|f| f.drug_name.as_str()).collect();
        assert_eq!(names, vec!["Zoloft", "Lipitor", "Prozac"]);
        assert_eq!(report.drug_classes, vec!["Antidepressants", "Statins"]);
        assert_eq!(report.gaps.len(), 3);
        assert!(report.flag_for("Lipitor").is_some());
        assert!(report.flag_for("Unknown").is_none());
    }

    #[test]
    fn empty_report_is_empty() {
        let report = AdherenceReport::empty(date(2020, 6, 1), DrugFilter::All, 40, DefectReport::default());
        assert!(report.is_empty());
        assert!(report.drug_classes.is_empty());
        assert!(report.mpr_projection.is_empty());
    }

    #[test]
    fn report_serializes_dates_as_iso_strings() {
        let report = AdherenceReport::from_results(
            date(2020, 6, 1),
            DrugFilter::Drug("Lipitor".into()),
            70,
            vec![result("Lipitor", "Statins")],
            DefectReport::default(),
        );
        let json = report.to_json().unwrap();
        assert!(json.contains("\"as_of\":\"2020-06-01\""));
        assert!(json.contains("\"drug_filter\":\"Lipitor\""));
        assert!(json.contains("\"risk_level\":\"low\""));

        let back: AdherenceReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
