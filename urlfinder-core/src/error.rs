//! Error types for urlfinder.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("CSV file '{}' not found.", .0.display())]
    DataNotFound(PathBuf),

    #[error("Template '{}' not found in directory '{}'", .name, .dir.display())]
    TemplateNotFound { name: String, dir: PathBuf },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to reach model at {url} (is it running?): {source}")]
    ModelUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("model returned HTTP {status}: {body}")]
    ModelStatus { status: u16, body: String },

    #[error("model reply malformed: {0}")]
    ModelProtocol(String),

    #[error("invalid model host '{host}': {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid rules: {0}")]
    Rules(String),

    #[error("invalid config {key}={value}")]
    Config { key: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
