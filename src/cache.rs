//! Per-patient report cache.
//!
//! Holds the latest adherence report for each patient id, keyed by a SHA-256
//! fingerprint of everything that determines it (dispenses, filter, birthdate,
//! engine configuration). A changed fingerprint means a recompute; reports are
//! never partially updated.
//!
//! The fingerprint does not cover the drug-class table; use one cache per engine.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::adherence::{AdherenceEngine, AdherenceError, AdherenceReport, EngineConfig};
use crate::models::{DrugFilter, RawDispense};

#[derive(Serialize)]
struct CacheKeyInput<'a> {
    pills: &'a [RawDispense],
    drug_filter: &'a DrugFilter,
    birthdate: &'a str,
    config: &'a EngineConfig,
}

/// Base64 SHA-256 over the canonical JSON of one engine invocation's inputs.
pub fn input_hash(
    pills: &[RawDispense],
    drug_filter: &DrugFilter,
    birthdate: &str,
    config: &EngineConfig,
) -> Result<String, AdherenceError> {
    let canonical = serde_json::to_vec(&CacheKeyInput {
        pills,
        drug_filter,
        birthdate,
        config,
    })
    .map_err(|e| AdherenceError::Serialization(e.to_string()))?;
    let digest = Sha256::digest(&canonical);
    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}

// ═══════════════════════════════════════════════════════════
// CachedReport
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct CachedReport {
    input_hash: String,
    report: AdherenceReport,
}

impl CachedReport {
    pub fn input_hash(&self) -> &str {
        &self.input_hash
    }

    pub fn report(&self) -> &AdherenceReport {
        &self.report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

// ═══════════════════════════════════════════════════════════
// AdherenceCache
// ═══════════════════════════════════════════════════════════

/// One report snapshot per patient id.
#[derive(Debug)]
pub struct AdherenceCache {
    entries: HashMap<String, CachedReport>,
    hits: u64,
    misses: u64,
}

impl AdherenceCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached report for `patient_id`, regardless of freshness.
    pub fn get(&self, patient_id: &str) -> Option<&AdherenceReport> {
        self.entries.get(patient_id).map(|c| &c.report)
    }

    /// Cached entry for `patient_id` if it was computed from `input_hash`.
    pub fn get_fresh(&self, patient_id: &str, input_hash: &str) -> Option<&AdherenceReport> {
        self.entries
            .get(patient_id)
            .filter(|c| c.input_hash == input_hash)
            .map(|c| &c.report)
    }

    /// Store a report, replacing any previous snapshot for the patient.
    pub fn insert(&mut self, patient_id: impl Into<String>, input_hash: String, report: AdherenceReport) {
        self.entries.insert(
            patient_id.into(),
            CachedReport {
                input_hash,
                report,
            },
        );
    }

    /// Cached report when the inputs are unchanged, otherwise run `engine` and cache the result.
    /// A failed run leaves any previous snapshot in place.
    pub fn get_or_compute(
        &mut self,
        engine: &AdherenceEngine,
        patient_id: &str,
        pills: &[RawDispense],
        drug_filter: &DrugFilter,
        birthdate: &str,
    ) -> Result<&AdherenceReport, CacheError> {
        let hash = input_hash(pills, drug_filter, birthdate, engine.config())?;

        match self.entries.entry(patient_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().input_hash == hash {
                    self.hits += 1;
                    tracing::debug!(patient_id, "Adherence cache hit");
                } else {
                    self.misses += 1;
                    tracing::debug!(patient_id, "Adherence inputs changed, recomputing");
                    let report = engine.run(pills, drug_filter, birthdate)?;
                    entry.insert(CachedReport {
                        input_hash: hash,
                        report,
                    });
                }
                Ok(&entry.into_mut().report)
            }
            Entry::Vacant(entry) => {
                self.misses += 1;
                tracing::debug!(patient_id, "Adherence cache miss");
                let report = engine.run(pills, drug_filter, birthdate)?;
                let cached = entry.insert(CachedReport {
                    input_hash: hash,
                    report,
                });
                Ok(&cached.report)
            }
        }
    }

    /// Drop the snapshot for one patient. Returns whether one existed.
    pub fn invalidate(&mut self, patient_id: &str) -> bool {
        self.entries.remove(patient_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

impl Default for AdherenceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Adherence analysis failed: {0}")]
    Adherence(#[from] AdherenceError),
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
