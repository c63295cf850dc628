//! Cross-validation of queries against search sources and confidence scoring.

use crate::error::{Error, Result};
use crate::sanitize::Query;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Google,
    Bing,
    DuckDuckGo,
}

impl Engine {
    pub const ALL: [Engine; 3] = [Engine::Google, Engine::Bing, Engine::DuckDuckGo];

    pub fn name(self) -> &'static str {
        match self {
            Engine::Google => "google",
            Engine::Bing => "bing",
            Engine::DuckDuckGo => "duckduckgo",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Engine::Google => "Google",
            Engine::Bing => "Bing",
            Engine::DuckDuckGo => "DuckDuckGo",
        }
    }

    fn base(self) -> &'static str {
        match self {
            Engine::Google => "https://www.google.com/search?q=",
            Engine::Bing => "https://www.bing.com/search?q=",
            Engine::DuckDuckGo => "https://duckduckgo.com/?q=",
        }
    }

    /// Direct search link; `sanitized` must already be encoded.
    pub fn search_url(self, sanitized: &str) -> String {
        format!("{}{}", self.base(), sanitized)
    }

    pub fn from_name(s: &str) -> Option<Engine> {
        Engine::ALL.into_iter().find(|e| e.name().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered so that `Low < Medium < High`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// 3 of 3 → HIGH, 2 → MEDIUM, anything less → LOW.
    pub fn from_matches(matches: usize) -> Self {
        match matches {
            m if m >= 3 => Confidence::High,
            2 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A result set that can say whether a query is present in it.
pub trait SearchSource {
    fn engine(&self) -> Engine;
    fn contains(&self, query: &Query) -> bool;
}

/// NFKC, lowercase, whitespace collapsed to single spaces.
pub fn normalize_query(s: &str) -> String {
    let t: String = s.nfkc().collect::<String>().to_lowercase();
    t.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    /// Any keyword occurs in the query.
    Any(Vec<String>),
    /// Every keyword occurs in the query.
    All(Vec<String>),
    /// The whole query equals this text.
    Exact(String),
}

impl Rule {
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            Rule::Any(ks) => ks.iter().any(|k| normalized.contains(&normalize_query(k))),
            Rule::All(ks) => !ks.is_empty() && ks.iter().all(|k| normalized.contains(&normalize_query(k))),
            Rule::Exact(s) => normalized == normalize_query(s),
        }
    }
}

/// Offline stand-in for an engine's result set, driven by keyword rules.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    engine: Engine,
    rules: Vec<Rule>,
}

impl SimulatedSource {
    pub fn new(engine: Engine, rules: Vec<Rule>) -> Self {
        Self { engine, rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The demo result sets: Google knows Diebold and Paccar, Bing only
    /// Paccar's G2 page, DuckDuckGo only the exact Diebold query.
    pub fn defaults() -> Vec<SimulatedSource> {
        vec![
            SimulatedSource::new(Engine::Google, vec![Rule::Any(vec!["diebold".into(), "paccar".into()])]),
            SimulatedSource::new(Engine::Bing, vec![Rule::All(vec!["paccar".into(), "g2".into()])]),
            SimulatedSource::new(Engine::DuckDuckGo, vec![Rule::Exact("diebold g2 reviews".into())]),
        ]
    }

    /// Loads `{"google": [{"any": [..]}], "bing": [...], "duckduckgo": [...]}`.
    /// Engines missing from the file keep no rules and never match.
    pub fn from_json_str(s: &str) -> Result<Vec<SimulatedSource>> {
        let raw: BTreeMap<String, Vec<Rule>> = serde_json::from_str(s)?;
        let mut by_engine: BTreeMap<Engine, Vec<Rule>> = BTreeMap::new();
        for (name, rules) in raw {
            let engine = Engine::from_name(&name)
                .ok_or_else(|| Error::Rules(format!("unknown engine '{}'", name)))?;
            by_engine.entry(engine).or_default().extend(rules);
        }
        Ok(Engine::ALL
            .into_iter()
            .map(|e| SimulatedSource::new(e, by_engine.remove(&e).unwrap_or_default()))
            .collect())
    }

    pub fn from_json_file(path: &Path) -> Result<Vec<SimulatedSource>> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }
}

impl SearchSource for SimulatedSource {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn contains(&self, query: &Query) -> bool {
        let n = normalize_query(&query.raw);
        self.rules.iter().any(|r| r.matches(&n))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EngineVerdict {
    pub engine: Engine,
    pub matched: bool,
    pub url: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub query: Query,
    pub verdicts: Vec<EngineVerdict>,
    pub matches: usize,
    pub confidence: Confidence,
}

impl ValidationResult {
    /// `(2/3 matches) google: MATCH | bing: MATCH | duckduckgo: FAIL`
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .verdicts
            .iter()
            .map(|v| format!("{}: {}", v.engine, if v.matched { "MATCH" } else { "FAIL" }))
            .collect();
        format!("({}/{} matches) {}", self.matches, self.verdicts.len(), parts.join(" | "))
    }
}

pub struct CrossValidator {
    sources: Vec<Box<dyn SearchSource>>,
}

impl CrossValidator {
    pub fn new(sources: Vec<Box<dyn SearchSource>>) -> Self {
        Self { sources }
    }

    pub fn simulated(sources: Vec<SimulatedSource>) -> Self {
        Self::new(sources.into_iter().map(|s| Box::new(s) as Box<dyn SearchSource>).collect())
    }

    pub fn assess(&self, query: &Query) -> ValidationResult {
        let verdicts: Vec<EngineVerdict> = self
            .sources
            .iter()
            .map(|s| EngineVerdict {
                engine: s.engine(),
                matched: s.contains(query),
                url: s.engine().search_url(&query.sanitized),
            })
            .collect();
        let matches = verdicts.iter().filter(|v| v.matched).count();
        ValidationResult {
            query: query.clone(),
            verdicts,
            matches,
            confidence: Confidence::from_matches(matches),
        }
    }
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::simulated(SimulatedSource::defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assess(q: &str) -> ValidationResult {
        CrossValidator::default().assess(&Query::new(q, 0))
    }

    #[test]
    fn confidence_mapping_is_monotonic() {
        assert_eq!(Confidence::from_matches(0), Confidence::Low);
        assert_eq!(Confidence::from_matches(1), Confidence::Low);
        assert_eq!(Confidence::from_matches(2), Confidence::Medium);
        assert_eq!(Confidence::from_matches(3), Confidence::High);
        for m in 0..5 {
            assert!(Confidence::from_matches(m) <= Confidence::from_matches(m + 1));
        }
    }

    #[test]
    fn default_sources_reproduce_demo_results() {
        let r = assess("Diebold G2 Reviews");
        assert_eq!(r.matches, 2);
        assert_eq!(r.confidence, Confidence::Medium);
        assert_eq!(r.summary(), "(2/3 matches) google: MATCH | bing: FAIL | duckduckgo: MATCH");

        let r = assess("paccar g2 reviews");
        assert_eq!(r.matches, 2);
        assert_eq!(r.verdicts[1].engine, Engine::Bing);
        assert!(r.verdicts[1].matched);

        let r = assess("acme widgets");
        assert_eq!(r.confidence, Confidence::Low);
    }

    #[test]
    fn verdicts_carry_search_urls() {
        let r = assess("diebold g2 reviews");
        assert_eq!(r.verdicts[0].url, "https://www.google.com/search?q=diebold+g2+reviews");
        assert_eq!(r.verdicts[1].url, "https://www.bing.com/search?q=diebold+g2+reviews");
        assert_eq!(r.verdicts[2].url, "https://duckduckgo.com/?q=diebold+g2+reviews");
    }

    #[test]
    fn normalization_folds_width_case_and_spacing() {
        assert_eq!(normalize_query("  ＤＩＥＢＯＬＤ\tG2   Reviews "), "diebold g2 reviews");
    }

    #[test]
    fn rules_from_json_all_three_agree() {
        let sources = SimulatedSource::from_json_str(
            r#"{"google": [{"any": ["acme"]}], "Bing": [{"all": ["acme", "g2"]}], "duckduckgo": [{"exact": "acme g2"}]}"#,
        )
        .unwrap();
        let v = CrossValidator::simulated(sources);
        let r = v.assess(&Query::new("ACME  g2", 1));
        assert_eq!(r.confidence, Confidence::High);
        assert_eq!(r.query.source_index, 1);
    }

    #[test]
    fn rules_with_unknown_engine_are_rejected() {
        let err = SimulatedSource::from_json_str(r#"{"yahoo": []}"#).unwrap_err();
        assert!(err.to_string().contains("yahoo"));
    }

    #[test]
    fn engine_missing_from_rules_never_matches() {
        let sources = SimulatedSource::from_json_str(r#"{"google": [{"any": ["x"]}]}"#).unwrap();
        assert_eq!(sources.len(), 3);
        assert!(sources[1].rules().is_empty());
        assert!(!sources[1].contains(&Query::new("x", 0)));
    }
}
