use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::models::enums::DefectKind;
use crate::models::{DispenseRecord, DrugFilter, RawDispense};

use super::types::{AdherenceError, DefectReport, RecordDefect};

const ISO_DATE: &str = "%Y-%m-%d";

/// Parses the calendar date out of an ISO date or datetime string.
/// Accepts `2020-01-01`, `2020-01-01T09:30:00Z`, `2020-01-01T09:30:00+02:00`
/// and the naive `2020-01-01T09:30:00` / `2020-01-01 09:30:00`.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, ISO_DATE) {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|dt| dt.date())
}

/// Whole day count from a JSON number or numeric string; `30.0` counts, `30.5` does not.
fn whole_days(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64).then_some(value as i64)
}

/// Parses the patient birthdate. It must be a real date no later than `as_of`.
pub fn parse_birthdate(raw: &str, as_of: NaiveDate) -> Result<NaiveDate, AdherenceError> {
    let birthdate = parse_iso_date(raw)
        .ok_or_else(|| AdherenceError::InvalidBirthdate(format!("unparsable date '{raw}'")))?;

    if birthdate > as_of {
        return Err(AdherenceError::InvalidBirthdate(format!(
            "{birthdate} is after the processing date {as_of}"
        )));
    }

    Ok(birthdate)
}

/// Records that passed validation plus the accounting for those that did not.
#[derive(Debug, Clone)]
pub struct ValidatedDispenses {
    pub records: Vec<DispenseRecord>,
    pub defects: DefectReport,
}

/// Validates every record in scope of `filter`. Out-of-scope records are ignored entirely.
///
/// In strict mode the first invalid record aborts with `InvalidRecord`; otherwise it is
/// skipped and listed in the defect report.
pub fn validate_dispenses(
    raw: &[RawDispense],
    filter: &DrugFilter,
    as_of: NaiveDate,
    strict_mode: bool,
) -> Result<ValidatedDispenses, AdherenceError> {
    let mut records = Vec::new();
    let mut defects = DefectReport::default();

    for (index, pill) in raw.iter().enumerate() {
        if !filter.matches(&pill.drug_name) {
            continue;
        }
        defects.total_records += 1;

        match validate_one(pill, as_of) {
            Ok(record) => {
                defects.accepted += 1;
                records.push(record);
            }
            Err((kind, detail)) => {
                if strict_mode {
                    return Err(AdherenceError::InvalidRecord {
                        index,
                        kind,
                        detail,
                    });
                }

                tracing::warn!(
                    index,
                    kind = kind.as_str(),
                    detail = %detail,
                    "Skipping invalid dispense record"
                );
                defects.defects.push(RecordDefect {
                    index,
                    id: pill.id.clone(),
                    drug_name: pill.drug_name.trim().to_string(),
                    kind,
                    detail,
                });
            }
        }
    }

    Ok(ValidatedDispenses { records, defects })
}

fn validate_one(pill: &RawDispense, as_of: NaiveDate) -> Result<DispenseRecord, (DefectKind, String)> {
    let drug_name = pill.drug_name.trim();
    if drug_name.is_empty() {
        return Err((DefectKind::EmptyDrugName, "drug name is empty".into()));
    }

    let days_supply = match whole_days(&pill.days_supply).map(u32::try_from) {
        Some(Ok(days)) if days > 0 => days,
        _ => {
            return Err((
                DefectKind::NonPositiveSupply,
                format!("days_supply must be a positive whole day count, got {}", pill.days_supply),
            ))
        }
    };

    let dispensed_on = pill
        .dispensed_on
        .as_str()
        .and_then(parse_iso_date)
        .ok_or_else(|| {
            (
                DefectKind::UnparsableDate,
                format!("cannot parse dispense date {}", pill.dispensed_on),
            )
        })?;

    if dispensed_on > as_of {
        return Err((
            DefectKind::FutureDated,
            format!("dispensed on {dispensed_on}, after processing date {as_of}"),
        ));
    }

    Ok(DispenseRecord {
        id: pill.id.clone(),
        drug_name: drug_name.to_string(),
        days_supply,
        dispensed_on,
    })
}
