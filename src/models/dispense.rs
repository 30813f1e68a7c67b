use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A dispense exactly as the record fetcher hands it over: nothing validated yet.
///
/// Fields are read leniently so one malformed record (decimal or textual supply,
/// null date, numeric id) becomes a defect during validation instead of failing
/// the whole request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDispense {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_name")]
    pub drug_name: String,
    /// Whole number of days, as a JSON number or numeric string.
    #[serde(default)]
    pub days_supply: Value,
    /// ISO date or datetime string (`whenHandedOver`).
    #[serde(default)]
    pub dispensed_on: Value,
}

impl RawDispense {
    pub fn new(drug_name: impl Into<String>, days_supply: i64, dispensed_on: impl Into<String>) -> Self {
        Self {
            id: None,
            drug_name: drug_name.into(),
            days_supply: Value::from(days_supply),
            dispensed_on: Value::String(dispensed_on.into()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// A validated dispense: non-empty name, positive supply, parsed date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseRecord {
    pub id: Option<String>,
    pub drug_name: String,
    pub days_supply: u32,
    pub dispensed_on: NaiveDate,
}

/// Which medications a run covers. Serialized as a plain string, `"all"` meaning no filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DrugFilter {
    #[default]
    All,
    Drug(String),
}

impl DrugFilter {
    pub fn matches(&self, drug_name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Drug(name) => name == drug_name.trim(),
        }
    }
}

impl From<String> for DrugFilter {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Drug(trimmed.to_string())
        }
    }
}

impl From<&str> for DrugFilter {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<DrugFilter> for String {
    fn from(value: DrugFilter) -> Self {
        match value {
            DrugFilter::All => "all".to_string(),
            DrugFilter::Drug(name) => name,
        }
    }
}

/// One patient's validated history, grouped by drug in order of first appearance.
/// Records within each group are sorted by dispense date (stable for same-day fills).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientContext {
    pub birthdate: NaiveDate,
    pub dispenses: Vec<(String, Vec<DispenseRecord>)>,
}

impl PatientContext {
    pub fn new(birthdate: NaiveDate, records: Vec<DispenseRecord>) -> Self {
        let mut dispenses: Vec<(String, Vec<DispenseRecord>)> = Vec::new();

        for record in records {
            match dispenses.iter_mut().find(|(name, _)| *name == record.drug_name) {
                Some((_, group)) => group.push(record),
                None => dispenses.push((record.drug_name.clone(), vec![record])),
            }
        }

        for (_, group) in &mut dispenses {
            group.sort_by_key(|r| r.dispensed_on);
        }

        Self {
            birthdate,
            dispenses,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dispenses.is_empty()
    }

    pub fn drug_names(&self) -> Vec<&str> {
        self.dispenses.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn records_for(&self, drug_name: &str) -> Option<&[DispenseRecord]> {
        self.dispenses
            .iter()
            .find(|(name, _)| name == drug_name)
            .map(|(_, group)| group.as_slice())
    }

    /// Age in completed years on `as_of`.
    pub fn age_years_at(&self, as_of: NaiveDate) -> u32 {
        let mut years = as_of.year() - self.birthdate.year();
        if (as_of.month(), as_of.day()) < (self.birthdate.month(), self.birthdate.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(name: &str, supply: u32, on: NaiveDate) -> DispenseRecord {
        DispenseRecord {
            id: None,
            drug_name: name.into(),
            days_supply: supply,
            dispensed_on: on,
        }
    }

    #[test]
    fn drug_filter_all_variants() {
        assert_eq!(DrugFilter::from("all"), DrugFilter::All);
        assert_eq!(DrugFilter::from("ALL"), DrugFilter::All);
        assert_eq!(DrugFilter::from(""), DrugFilter::All);
        assert_eq!(DrugFilter::from(" Lipitor "), DrugFilter::Drug("Lipitor".into()));
    }

    #[test]
    fn drug_filter_matches_trimmed_name() {
        let filter = DrugFilter::from("Lipitor");
        assert!(filter.matches("Lipitor"));
        assert!(filter.matches("  Lipitor"));
        assert!(!filter.matches("lipitor"));
        assert!(DrugFilter::All.matches("anything"));
    }

    #[test]
    fn drug_filter_serializes_as_string() {
        let json = serde_json::to_string(&DrugFilter::Drug("Zoloft".into())).unwrap();
        assert_eq!(json, "\"Zoloft\"");
        let back: DrugFilter = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(back, DrugFilter::All);
    }

    #[test]
    fn raw_dispense_id_defaults_to_none() {
        let raw: RawDispense = serde_json::from_str(
            r#"{"drug_name":"Lipitor","days_supply":30,"dispensed_on":"2020-01-01"}"#,
        )
        .unwrap();
        assert_eq!(raw, RawDispense::new("Lipitor", 30, "2020-01-01"));
        assert_eq!(raw.with_id("rx-1").id.as_deref(), Some("rx-1"));
    }

    #[test]
    fn raw_dispense_reads_malformed_fields_without_failing() {
        let raw: Vec<RawDispense> = serde_json::from_str(
            r#"[
                {"id": 17, "drug_name": "Lipitor", "days_supply": 30.5, "dispensed_on": null},
                {"drug_name": null, "days_supply": "thirty"},
                {"id": null, "drug_name": "Zoloft", "days_supply": 30, "dispensed_on": "2020-01-01"}
            ]"#,
        )
        .unwrap();

        assert_eq!(raw[0].id.as_deref(), Some("17"));
        assert_eq!(raw[0].dispensed_on, Value::Null);
        assert_eq!(raw[1].drug_name, "");
        assert_eq!(raw[1].dispensed_on, Value::Null);
        assert_eq!(raw[2], RawDispense::new("Zoloft", 30, "2020-01-01"));
    }

    #[test]
    fn context_groups_by_first_appearance_and_sorts() {
        let ctx = PatientContext::new(
            date(1950, 5, 5),
            vec![
                record("B", 30, date(2020, 3, 1)),
                record("A", 30, date(2020, 2, 1)),
                record("B", 30, date(2020, 1, 1)),
            ],
        );

        assert_eq!(ctx.drug_names(), vec!["B", "A"]);
        let b = ctx.records_for("B").unwrap();
        assert_eq!(b[0].dispensed_on, date(2020, 1, 1));
        assert_eq!(b[1].dispensed_on, date(2020, 3, 1));
        assert!(ctx.records_for("C").is_none());
    }

    #[test]
    fn empty_context() {
        let ctx = PatientContext::new(date(1950, 1, 1), vec![]);
        assert!(ctx.is_empty());
        assert!(ctx.drug_names().is_empty());
    }

    #[test]
    fn age_counts_completed_years() {
        let ctx = PatientContext::new(date(1950, 6, 15), vec![]);
        assert_eq!(ctx.age_years_at(date(2020, 6, 14)), 69);
        assert_eq!(ctx.age_years_at(date(2020, 6, 15)), 70);
        assert_eq!(ctx.age_years_at(date(1950, 6, 15)), 0);
    }
}
