//! Generate search queries with a local model, repair its JSON, encode the
//! queries for URLs and score them against several search sources.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod repair;
pub mod sanitize;
pub mod validate;

pub use config::Config;
pub use error::{Error, Result};
pub use llm::{OllamaClient, QueryGenerator};
pub use pipeline::{summarize, ItemReport, Outcome, Pipeline, RunSummary};
pub use prompt::{load_rows, PromptRow, Template};
pub use repair::{extract_queries, parse_lenient, repair_json, ParseFailure, Parsed};
pub use sanitize::{encode_query_component, Query};
pub use validate::{
    Confidence, CrossValidator, Engine, EngineVerdict, SearchSource, SimulatedSource, ValidationResult,
};
