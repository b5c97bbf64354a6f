//! Ingest-time value bound rules attached to feature views.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::registry::Value;

const MAX_REPORTED_VIOLATIONS: usize = 256;

/// Inclusive numeric bounds for one feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsRule {
    pub field: String,
    pub min: f64,
    pub max: f64,
}

impl BoundsRule {
    pub fn new(field: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            field: field.into(),
            min,
            max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationPolicy {
    Strict,
    ReportAndSkip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub input_rows: u64,
    pub ingested_rows: u64,
    pub skipped_rows: u64,
    pub violations: Vec<String>,
    pub first_error: Option<String>,
}

impl IngestReport {
    pub fn new(input_rows: u64) -> Self {
        Self {
            input_rows,
            ingested_rows: 0,
            skipped_rows: 0,
            violations: Vec::new(),
            first_error: None,
        }
    }

    pub fn record_violation(&mut self, detail: String) {
        self.skipped_rows = self.skipped_rows.saturating_add(1);
        if self.first_error.is_none() {
            self.first_error = Some(detail.clone());
        }
        if self.violations.len() < MAX_REPORTED_VIOLATIONS {
            self.violations.push(detail);
        }
    }
}

/// Returns the first violated rule as a human-readable detail, or None when
/// every bound holds. Null values are never violations; absence degrades to
/// null downstream rather than failing ingest.
pub fn check_bounds(rules: &[BoundsRule], values: &BTreeMap<String, Value>) -> Option<String> {
    for rule in rules {
        let value = match values.get(&rule.field) {
            Some(value) => value,
            None => continue,
        };
        if value.is_null() {
            continue;
        }
        let numeric = match value.as_f64() {
            Some(numeric) => numeric,
            None => {
                return Some(format!(
                    "field {} is not numeric, cannot check bounds",
                    rule.field
                ))
            }
        };
        if numeric < rule.min || numeric > rule.max {
            return Some(format!(
                "field {} value {} outside [{}, {}]",
                rule.field, numeric, rule.min, rule.max
            ));
        }
    }
    None
}
