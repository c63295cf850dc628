use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_HOST: &str = "http://127.0.0.1:11434";

#[derive(Clone, Debug)]
pub struct Config {
    pub model: String,
    pub host: String,
    pub template_dir: PathBuf,
    pub template: String,
    pub data_file: PathBuf,
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            host: DEFAULT_HOST.to_string(),
            template_dir: PathBuf::from("templates"),
            template: "instructions.txt".to_string(),
            data_file: PathBuf::from("businesses.txt"),
            timeout: Duration::from_secs(120),
            temperature: None,
            system_prompt: None,
        }
    }
}

impl Config {
    /// Defaults overlaid with `URLFINDER_*` / `OLLAMA_HOST` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        let mut c = Config::default();
        if let Some(v) = non_empty("URLFINDER_MODEL") {
            c.model = v;
        }
        if let Some(v) = non_empty("OLLAMA_HOST") {
            c.host = v;
        }
        if let Some(v) = non_empty("URLFINDER_TEMPLATE_DIR") {
            c.template_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("URLFINDER_TEMPLATE") {
            c.template = v;
        }
        if let Some(v) = non_empty("URLFINDER_DATA") {
            c.data_file = PathBuf::from(v);
        }
        if let Some(v) = non_empty("URLFINDER_TIMEOUT_SECS") {
            let secs = v
                .trim()
                .parse::<u64>()
                .map_err(|_| Error::Config { key: "URLFINDER_TIMEOUT_SECS", value: v.clone() })?;
            c.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = non_empty("URLFINDER_TEMPERATURE") {
            let t = v
                .trim()
                .parse::<f32>()
                .map_err(|_| Error::Config { key: "URLFINDER_TEMPERATURE", value: v.clone() })?;
            c.temperature = Some(t);
        }
        if let Some(v) = non_empty("URLFINDER_SYSTEM_PROMPT") {
            c.system_prompt = Some(v);
        }
        Ok(c)
    }

    pub fn template_path(&self) -> PathBuf {
        self.template_dir.join(&self.template)
    }
}
