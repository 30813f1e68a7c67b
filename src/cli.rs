//! Command line front end: JSON request in, JSON report out.
//!
//! Usage:
//!   mpr-monitor analyze <request.json> [--pretty] [--output <file>] [--drug-classes <table.json>]
//!   mpr-monitor classes [--drug-classes <table.json>]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adherence::{AdherenceEngine, AdherenceError, AdherenceReport, DrugClassTable, EngineConfig};
use crate::models::{DrugFilter, RawDispense};

#[derive(Parser, Debug)]
#[command(name = "mpr-monitor")]
#[command(version)]
#[command(about = "Medication adherence from pill-dispense history", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyse one patient's dispense history
    Analyze {
        /// Request file: { patient_id?, birthdate, drug_filter?, config, dispenses }
        input: PathBuf,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Custom drug-class table (JSON array of { class, members?, pattern? })
        #[arg(long)]
        drug_classes: Option<PathBuf>,
    },

    /// List drug classes
    Classes {
        /// Custom drug-class table instead of the built-in one
        #[arg(long)]
        drug_classes: Option<PathBuf>,
    },
}

/// One engine invocation as read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub patient_id: Option<String>,
    pub birthdate: String,
    #[serde(default)]
    pub drug_filter: DrugFilter,
    pub config: EngineConfig,
    pub dispenses: Vec<RawDispense>,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Adherence(#[from] AdherenceError),
}

pub fn load_request(path: &Path) -> Result<AnalysisRequest, CliError> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_drug_classes(path: Option<&Path>) -> Result<DrugClassTable, CliError> {
    match path {
        Some(path) => Ok(DrugClassTable::from_json(&fs::read_to_string(path)?)?),
        None => Ok(DrugClassTable::builtin()),
    }
}

pub fn analyze(request: &AnalysisRequest, drug_classes: DrugClassTable) -> Result<AdherenceReport, CliError> {
    let engine = AdherenceEngine::with_drug_classes(request.config.clone(), drug_classes)?;
    tracing::info!(
        patient_id = request.patient_id.as_deref().unwrap_or("-"),
        dispenses = request.dispenses.len(),
        as_of = %request.config.as_of,
        "Analysing dispense history"
    );
    Ok(engine.run(&request.dispenses, &request.drug_filter, &request.birthdate)?)
}

pub fn render(report: &AdherenceReport, pretty: bool) -> Result<String, CliError> {
    let json = if pretty {
        report.to_json_pretty()?
    } else {
        report.to_json()?
    };
    Ok(json)
}

pub fn execute(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Analyze {
            input,
            pretty,
            output,
            drug_classes,
        } => {
            let request = load_request(&input)?;
            let table = load_drug_classes(drug_classes.as_deref())?;
            let report = analyze(&request, table)?;
            let rendered = render(&report, pretty)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered)?;
                    tracing::info!(path = %path.display(), "Report written");
                }
                None => writeln!(io::stdout().lock(), "{rendered}")?,
            }
        }
        Commands::Classes { drug_classes } => {
            let table = load_drug_classes(drug_classes.as_deref())?;
            let mut stdout = io::stdout().lock();
            for class in table.class_names() {
                writeln!(stdout, "{class}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::DefectKind;

    const REQUEST: &str = r#"{
        "patient_id": "smart-1288992",
        "birthdate": "1950-04-12",
        "drug_filter": "all",
        "config": { "as_of": "2020-06-01" },
        "dispenses": [
            { "id": "rx-1", "drug_name": "Lipitor", "days_supply": 30, "dispensed_on": "2020-01-01" },
            { "drug_name": "Zoloft", "days_supply": 30, "dispensed_on": "2020-01-05T09:30:00Z" },
            { "drug_name": "Zoloft", "days_supply": -3, "dispensed_on": "2020-02-05" }
        ]
    }"#;

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parses_analyze_command() {
        let cli = Cli::try_parse_from(["mpr-monitor", "analyze", "req.json", "--pretty"]).unwrap();
        match cli.command {
            Commands::Analyze {
                input,
                pretty,
                output,
                drug_classes,
            } => {
                assert_eq!(input, PathBuf::from("req.json"));
                assert!(pretty);
                assert!(output.is_none());
                assert!(drug_classes.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn load_and_analyze_request_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "request.json", REQUEST);

        let request = load_request(&path).unwrap();
        assert_eq!(request.patient_id.as_deref(), Some("smart-1288992"));
        assert_eq!(request.drug_filter, DrugFilter::All);
        assert_eq!(request.config.horizon_days, 365);

        let report = analyze(&request, DrugClassTable::builtin()).unwrap();
        assert_eq!(report.flags.len(), 2);
        assert_eq!(report.defects.skipped(), 1);
        assert_eq!(report.defects.defects[0].index, 2);
        assert_eq!(report.patient_age_years, 70);
    }

    #[test]
    fn malformed_dispense_is_a_defect_not_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "loose.json",
            r#"{
                "birthdate": "1950-04-12",
                "config": { "as_of": "2020-06-01" },
                "dispenses": [
                    { "drug_name": "Lipitor", "days_supply": 30, "dispensed_on": "2020-01-01" },
                    { "drug_name": "Lipitor", "days_supply": 30.0, "dispensed_on": "2020-01-31" },
                    { "drug_name": "Lipitor", "days_supply": 12.5, "dispensed_on": "2020-03-01" },
                    { "drug_name": "Zoloft", "days_supply": "30", "dispensed_on": null }
                ]
            }"#,
        );

        let report = analyze(&load_request(&path).unwrap(), DrugClassTable::builtin()).unwrap();
        assert_eq!(report.flags.len(), 1);
        assert_eq!(report.flag_for("Lipitor").unwrap().fill_count, 2);
        assert_eq!(report.defects.total_records, 4);
        assert_eq!(report.defects.count(DefectKind::NonPositiveSupply), 1);
        assert_eq!(report.defects.count(DefectKind::UnparsableDate), 1);
    }

    #[test]
    fn malformed_dispense_fails_in_strict_mode() {
        let request: AnalysisRequest = serde_json::from_str(
            r#"{
                "birthdate": "1950-04-12",
                "config": { "as_of": "2020-06-01", "strict_mode": true },
                "dispenses": [{ "drug_name": "Lipitor", "days_supply": 12.5, "dispensed_on": "2020-03-01" }]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            analyze(&request, DrugClassTable::builtin()),
            Err(CliError::Adherence(AdherenceError::InvalidRecord {
                kind: DefectKind::NonPositiveSupply,
                ..
            }))
        ));
    }

    #[test]
    fn missing_optional_fields_default() {
        let request: AnalysisRequest = serde_json::from_str(
            r#"{ "birthdate": "1980-01-01", "config": { "as_of": "2021-01-01" }, "dispenses": [] }"#,
        )
        .unwrap();
        assert!(request.patient_id.is_none());
        assert_eq!(request.drug_filter, DrugFilter::All);
        assert!(!request.config.strict_mode);
    }

    #[test]
    fn config_without_as_of_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "bad.json",
            r#"{ "birthdate": "1980-01-01", "config": {}, "dispenses": [] }"#,
        );
        assert!(matches!(load_request(&path), Err(CliError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_request(&dir.path().join("absent.json")),
            Err(CliError::Io(_))
        ));
    }

    #[test]
    fn invalid_config_surfaces_engine_error() {
        let request: AnalysisRequest = serde_json::from_str(
            r#"{ "birthdate": "1980-01-01", "config": { "as_of": "2021-01-01", "horizon_days": 0 }, "dispenses": [] }"#,
        )
        .unwrap();
        assert!(matches!(
            analyze(&request, DrugClassTable::builtin()),
            Err(CliError::Adherence(AdherenceError::Configuration(_)))
        ));
    }

    #[test]
    fn custom_drug_class_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "classes.json", r#"[{"class": "Lipid Lowering", "members": ["lipitor"]}]"#);

        let table = load_drug_classes(Some(&path)).unwrap();
        assert_eq!(table.class_names(), vec!["Lipid Lowering"]);
        assert_eq!(load_drug_classes(None).unwrap().len(), DrugClassTable::builtin().len());
    }

    #[test]
    fn execute_writes_report_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp(&dir, "request.json", REQUEST);
        let output = dir.path().join("report.json");

        execute(Cli {
            command: Commands::Analyze {
                input,
                pretty: false,
                output: Some(output.clone()),
                drug_classes: None,
            },
        })
        .unwrap();

        let written = fs::read_to_string(&output).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["drug_filter"], "all");
        assert_eq!(value["flags"][0]["drug_name"], "Lipitor");
        assert_eq!(value["flags"][0]["risk_level"], "high");
    }

    #[test]
    fn render_pretty_and_compact_agree() {
        let dir = tempfile::tempdir().unwrap();
        let request = load_request(&write_temp(&dir, "request.json", REQUEST)).unwrap();
        let report = analyze(&request, DrugClassTable::builtin()).unwrap();

        let compact: serde_json::Value = serde_json::from_str(&render(&report, false).unwrap()).unwrap();
        let pretty: serde_json::Value = serde_json::from_str(&render(&report, true).unwrap()).unwrap();
        assert_eq!(compact, pretty);
    }
}
