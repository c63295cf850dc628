//! generate → parse/repair → sanitize → validate, one prompt at a time.

use crate::llm::QueryGenerator;
use crate::repair::{extract_queries, parse_lenient, DEFAULT_MARKERS};
use crate::sanitize::Query;
use crate::validate::{Confidence, CrossValidator, ValidationResult};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Validated { repaired: bool, results: Vec<ValidationResult> },
    ModelUnavailable { message: String },
    ParseFailed { raw: String, reason: String },
    NoQuery { parsed: Value },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub items: usize,
    pub validated: usize,
    pub model_unavailable: usize,
    pub parse_failed: usize,
    pub no_query: usize,
    pub repaired: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

pub struct Pipeline<'a, G: QueryGenerator + ?Sized> {
    generator: &'a G,
    validator: &'a CrossValidator,
    markers: Vec<String>,
}

impl<'a, G: QueryGenerator + ?Sized> Pipeline<'a, G> {
    pub fn new(generator: &'a G, validator: &'a CrossValidator) -> Self {
        Self {
            generator,
            validator,
            markers: DEFAULT_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replaces the marker words used when a reply has no query-like key.
    pub fn with_markers(mut self, markers: Vec<String>) -> Self {
        self.markers = markers;
        self
    }

    /// Turns already-parsed model output into validated queries.
    pub fn validate_value(&self, index: usize, parsed: &Value) -> Vec<ValidationResult> {
        let markers: Vec<&str> = self.markers.iter().map(String::as_str).collect();
        extract_queries(parsed, &markers)
            .iter()
            .map(|q| self.validator.assess(&Query::new(q, index)))
            .collect()
    }

    pub fn process_prompt(&self, index: usize, prompt: &str) -> ItemReport {
        let raw = match self.generator.generate(prompt) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(item = index, error = %e, "model call failed");
                return ItemReport { index, outcome: Outcome::ModelUnavailable { message: e.to_string() } };
            }
        };
        let parsed = match parse_lenient(&raw) {
            Ok(p) => p,
            Err(e) => {
                warn!(item = index, error = %e, "could not parse model output");
                return ItemReport {
                    index,
                    outcome: Outcome::ParseFailed { raw: raw.trim().to_string(), reason: e.reason },
                };
            }
        };
        let repaired = parsed.was_repaired();
        if repaired {
            info!(item = index, "model output needed repair");
        }
        let results = self.validate_value(index, parsed.value());
        if results.is_empty() {
            warn!(item = index, "no query found in model output");
            return ItemReport { index, outcome: Outcome::NoQuery { parsed: parsed.into_value() } };
        }
        for r in &results {
            info!(item = index, query = %r.query.raw, confidence = %r.confidence, "{}", r.summary());
        }
        ItemReport { index, outcome: Outcome::Validated { repaired, results } }
    }

    pub fn run<S: AsRef<str>>(&self, prompts: &[S]) -> Vec<ItemReport> {
        prompts
            .iter()
            .enumerate()
            .map(|(i, p)| self.process_prompt(i, p.as_ref()))
            .collect()
    }
}

pub fn summarize(reports: &[ItemReport]) -> RunSummary {
    let mut s = RunSummary { items: reports.len(), ..RunSummary::default() };
    for r in reports {
        match &r.outcome {
            Outcome::Validated { repaired, results } => {
                s.validated += 1;
                if *repaired {
                    s.repaired += 1;
                }
                for v in results {
                    match v.confidence {
                        Confidence::High => s.high += 1,
                        Confidence::Medium => s.medium += 1,
                        Confidence::Low => s.low += 1,
                    }
                }
            }
            Outcome::ModelUnavailable { .. } => s.model_unavailable += 1,
            Outcome::ParseFailed { .. } => s.parse_failed += 1,
            Outcome::NoQuery { .. } => s.no_query += 1,
        }
    }
    s
}
