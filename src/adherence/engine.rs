use std::time::Instant;

use crate::models::{DispenseRecord, DrugFilter, PatientContext, RawDispense};

use super::drug_class::DrugClassTable;
use super::flags::{sort_flags, summarize};
use super::gaps::detect_gaps;
use super::mpr::{adherence_score, project_mpr};
use super::settings::EngineConfig;
use super::timeline::{daily_on_hand, possession_curve, reconstruct, ObservationWindow};
use super::types::{AdherenceError, AdherenceReport, AdherenceResult, CoverageSummary};
use super::validation::{parse_birthdate, validate_dispenses};

/// Stateless adherence analysis over one patient's dispense history.
/// Identical inputs always produce identical reports; safe to share across threads.
#[derive(Debug, Clone)]
pub struct AdherenceEngine {
    config: EngineConfig,
    drug_classes: DrugClassTable,
}

impl AdherenceEngine {
    /// Engine with the built-in drug-class table. Fails fast on invalid configuration.
    pub fn new(config: EngineConfig) -> Result<Self, AdherenceError> {
        Self::with_drug_classes(config, DrugClassTable::builtin())
    }

    pub fn with_drug_classes(
        config: EngineConfig,
        drug_classes: DrugClassTable,
    ) -> Result<Self, AdherenceError> {
        config.validate()?;
        Ok(Self {
            config,
            drug_classes,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn drug_classes(&self) -> &DrugClassTable {
        &self.drug_classes
    }

    /// Analyse every drug in `pills` that passes `drug_filter`.
    ///
    /// A filter matching nothing, or an empty history, yields an empty report rather than
    /// an error. Invalid records are skipped and reported unless `strict_mode` is set.
    pub fn run(
        &self,
        pills: &[RawDispense],
        drug_filter: &DrugFilter,
        birthdate: &str,
    ) -> Result<AdherenceReport, AdherenceError> {
        let start = Instant::now();
        let as_of = self.config.as_of;

        let birthdate = parse_birthdate(birthdate, as_of)?;
        let validated = validate_dispenses(pills, drug_filter, as_of, self.config.strict_mode)?;
        let context = PatientContext::new(birthdate, validated.records);
        let age = context.age_years_at(as_of);

        if context.is_empty() {
            tracing::debug!(
                filter = %String::from(drug_filter.clone()),
                input_records = pills.len(),
                skipped = validated.defects.skipped(),
                "No analysable dispenses"
            );
            return Ok(AdherenceReport::empty(
                as_of,
                drug_filter.clone(),
                age,
                validated.defects,
            ));
        }

        let results: Vec<AdherenceResult> = context
            .dispenses
            .iter()
            .filter_map(|(drug, records)| self.analyze_drug(drug, records))
            .collect();

        let mut report = AdherenceReport::from_results(
            as_of,
            drug_filter.clone(),
            age,
            results,
            validated.defects,
        );
        sort_flags(&mut report.flags, self.config.flag_order);

        tracing::info!(
            drugs = report.flags.len(),
            accepted = report.defects.accepted,
            skipped = report.defects.skipped(),
            processing_ms = start.elapsed().as_millis() as u64,
            "Adherence analysis complete"
        );

        Ok(report)
    }

    /// Full analysis of one drug's validated records. `None` when `records` is empty.
    pub fn analyze_drug(&self, drug_name: &str, records: &[DispenseRecord]) -> Option<AdherenceResult> {
        let horizon_days = self.config.horizon_days;
        let timeline = reconstruct(records, horizon_days, self.config.as_of);
        let window: ObservationWindow = timeline.window?;

        let gaps = detect_gaps(&timeline, &self.config.gap_severity_thresholds);
        let refill_timeline = possession_curve(records, &window);
        let mpr_projection = project_mpr(records, window.start, horizon_days);
        let score = adherence_score(&mpr_projection, window.days)?;

        let projected_covered_days = daily_on_hand(records, window.start, horizon_days)
            .iter()
            .filter(|on_hand| **on_hand > 0)
            .count() as u32;

        let covered_days = timeline.covered_days();
        let coverage = CoverageSummary {
            window_start: window.start,
            window_end: window.end,
            window_days: window.days,
            covered_days,
            gap_days: window.days - covered_days,
            coverage_end: timeline.coverage_end.unwrap_or(window.start),
            horizon_days,
            projected_covered_days,
            projected_uncovered_days: horizon_days - projected_covered_days,
        };

        let mut refill_dates: Vec<_> = records.iter().map(|r| r.dispensed_on).collect();
        refill_dates.sort();

        let drug_class = self.drug_classes.classify(drug_name);
        let flag = summarize(
            drug_name,
            records,
            &gaps,
            score,
            drug_class,
            &self.config.risk_thresholds,
        )?;

        tracing::debug!(
            drug = drug_name,
            drug_class,
            fills = records.len(),
            gaps = gaps.len(),
            score,
            risk = flag.risk_level.as_str(),
            "Drug analysed"
        );

        Some(AdherenceResult {
            drug_name: drug_name.to_string(),
            intervals: timeline.intervals,
            gaps,
            refill_timeline,
            mpr_projection,
            refill_dates,
            coverage,
            flag,
        })
    }
}
