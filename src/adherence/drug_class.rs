use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::AdherenceError;

/// Class reported for drug names that match no entry.
pub const UNCLASSIFIED: &str = "unclassified";

/// One row of a drug-class table as written in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugClassSpec {
    pub class: String,
    /// Generic and brand names; matched case-insensitively on word boundaries.
    #[serde(default)]
    pub members: Vec<String>,
    /// Extra raw regex, matched case-insensitively against the whole drug name.
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone)]
struct DrugClassEntry {
    class: String,
    matcher: Regex,
}

/// Drug name → clinical class lookup. Built once, read-only afterwards.
/// Entries are tried in table order; the first match wins.
#[derive(Debug, Clone)]
pub struct DrugClassTable {
    entries: Vec<DrugClassEntry>,
}

/// Built-in classes for common chronic-therapy medications.
const BUILTIN_CLASSES: &[(&str, &[&str])] = &[
    (
        "Statins",
        &[
            "atorvastatin", "lipitor", "simvastatin", "zocor", "rosuvastatin", "crestor",
            "pravastatin", "pravachol", "lovastatin", "mevacor", "fluvastatin", "pitavastatin",
        ],
    ),
    (
        "ACE Inhibitors",
        &[
            "lisinopril", "zestril", "prinivil", "enalapril", "vasotec", "ramipril", "altace",
            "captopril", "benazepril", "lotensin", "quinapril", "fosinopril", "perindopril",
        ],
    ),
    (
        "Angiotensin Receptor Blockers",
        &[
            "losartan", "cozaar", "valsartan", "diovan", "irbesartan", "avapro", "candesartan",
            "olmesartan", "telmisartan",
        ],
    ),
    (
        "Beta Blockers",
        &[
            "metoprolol", "lopressor", "toprol", "atenolol", "tenormin", "carvedilol", "coreg",
            "propranolol", "bisoprolol", "nebivolol",
        ],
    ),
    (
        "Calcium Channel Blockers",
        &["amlodipine", "norvasc", "diltiazem", "cardizem", "verapamil", "nifedipine"],
    ),
    (
        "Diuretics",
        &[
            "hydrochlorothiazide", "hctz", "furosemide", "lasix", "chlorthalidone",
            "spironolactone", "torsemide", "bumetanide",
        ],
    ),
    (
        "Antidiabetics",
        &[
            "metformin", "glucophage", "glipizide", "glyburide", "glimepiride", "sitagliptin",
            "januvia", "pioglitazone", "actos",
        ],
    ),
    (
        "Antidepressants",
        &[
            "sertraline", "zoloft", "fluoxetine", "prozac", "citalopram", "celexa",
            "escitalopram", "lexapro", "paroxetine", "paxil", "bupropion", "wellbutrin",
            "venlafaxine", "effexor", "duloxetine", "cymbalta",
        ],
    ),
    (
        "Antipsychotics",
        &[
            "quetiapine", "seroquel", "olanzapine", "zyprexa", "risperidone", "risperdal",
            "aripiprazole", "abilify",
        ],
    ),
    (
        "Anticonvulsants",
        &[
            "levetiracetam", "keppra", "lamotrigine", "lamictal", "valproate", "depakote",
            "carbamazepine", "tegretol", "phenytoin", "dilantin",
        ],
    ),
    (
        "Anticoagulants",
        &[
            "warfarin", "coumadin", "apixaban", "eliquis", "rivaroxaban", "xarelto", "dabigatran",
        ],
    ),
    ("Antiplatelets", &["clopidogrel", "plavix", "prasugrel", "ticagrelor"]),
    ("Thyroid Hormones", &["levothyroxine", "synthroid", "liothyronine"]),
    (
        "Proton Pump Inhibitors",
        &[
            "omeprazole", "prilosec", "esomeprazole", "nexium", "pantoprazole", "protonix",
            "lansoprazole",
        ],
    ),
];

static BUILTIN_TABLE: LazyLock<DrugClassTable> = LazyLock::new(|| {
    let specs = BUILTIN_CLASSES
        .iter()
        .map(|(class, members)| DrugClassSpec {
            class: (*class).to_string(),
            members: members.iter().map(|m| (*m).to_string()).collect(),
            pattern: None,
        })
        .collect::<Vec<_>>();
    // Member lists are literals escaped by `member_regex`, so compilation cannot fail.
    DrugClassTable::from_specs(&specs).unwrap_or(DrugClassTable { entries: Vec::new() })
});

impl DrugClassTable {
    /// The built-in table.
    pub fn builtin() -> Self {
        BUILTIN_TABLE.clone()
    }

    pub fn from_specs(specs: &[DrugClassSpec]) -> Result<Self, AdherenceError> {
        let entries = specs
            .iter()
            .map(|spec| {
                let matcher = member_regex(spec)?;
                Ok(DrugClassEntry {
                    class: spec.class.clone(),
                    matcher,
                })
            })
            .collect::<Result<Vec<_>, AdherenceError>>()?;
        Ok(Self { entries })
    }

    /// Load a custom table from a JSON array of `DrugClassSpec`.
    pub fn from_json(json: &str) -> Result<Self, AdherenceError> {
        let specs: Vec<DrugClassSpec> =
            serde_json::from_str(json).map_err(|e| AdherenceError::DrugClassTable(e.to_string()))?;
        Self::from_specs(&specs)
    }

    /// Class for `drug_name`, or [`UNCLASSIFIED`].
    pub fn classify(&self, drug_name: &str) -> &str {
        self.entries
            .iter()
            .find(|e| e.matcher.is_match(drug_name))
            .map(|e| e.class.as_str())
            .unwrap_or(UNCLASSIFIED)
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.class.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DrugClassTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn member_regex(spec: &DrugClassSpec) -> Result<Regex, AdherenceError> {
    let mut alternatives: Vec<String> = spec
        .members
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(|m| format!(r"\b{}\b", regex::escape(m)))
        .collect();
    if let Some(pattern) = spec.pattern.as_deref() {
        alternatives.push(format!("(?:{pattern})"));
    }
    if alternatives.is_empty() {
        return Err(AdherenceError::DrugClassTable(format!(
            "class '{}' has no members or pattern",
            spec.class
        )));
    }

    Regex::new(&format!("(?i){}", alternatives.join("|")))
        .map_err(|e| AdherenceError::DrugClassTable(format!("class '{}': {e}", spec.class)))
}
