use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use urlfinder_core::{Config, CrossValidator, SimulatedSource};

mod cmd;

/// バージョン情報を生成
fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\nBuilt: ",
        env!("BUILD_DATE"),
        "\nCommit: ",
        env!("GIT_HASH")
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "urlfinder",
    about = "Generate search queries with a local LLM and score them across search engines",
    version,
    long_version = long_version()
)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by commands that read the template and data file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct InputArgs {
    /// Template directory (fallback: $URLFINDER_TEMPLATE_DIR or templates)
    #[arg(long)]
    template_dir: Option<PathBuf>,
    /// Template file name (fallback: $URLFINDER_TEMPLATE or instructions.txt)
    #[arg(long)]
    template: Option<String>,
    /// Headed CSV data file (fallback: $URLFINDER_DATA or businesses.txt)
    #[arg(long)]
    data: Option<PathBuf>,
}

/// Flags for talking to the model.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct ModelArgs {
    /// Ollama model (fallback: $URLFINDER_MODEL or llama3)
    #[arg(long)]
    model: Option<String>,
    /// Ollama host (fallback: $OLLAMA_HOST or http://127.0.0.1:11434)
    #[arg(long)]
    host: Option<String>,
    /// Request timeout in seconds (fallback: $URLFINDER_TIMEOUT_SECS or 120)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Render prompts, ask the model, repair, encode and score every row
    Run {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        model: ModelArgs,
        /// JSON file with simulated engine rules
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Marker word for query extraction (repeatable; default: Reviews, Query)
        #[arg(long = "marker")]
        markers: Vec<String>,
        /// Output JSON envelope
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the rendered prompts without calling the model
    Render {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Repair raw model output (file or stdin) and list the queries in it
    Repair {
        /// Input file (default: stdin)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Marker word for query extraction (repeatable; default: Reviews, Query)
        #[arg(long = "marker")]
        markers: Vec<String>,
        /// Output JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Score queries against the simulated engines
    Assess {
        /// Query string (repeatable)
        #[arg(long, required = true)]
        query: Vec<String>,
        /// JSON file with simulated engine rules
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Output JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print verification links for a query
    Urls {
        /// Query string
        #[arg(long)]
        query: String,
    },
    /// Check whether the Ollama endpoint answers
    Check {
        #[command(flatten)]
        model: ModelArgs,
    },
}

/// Defaults, then environment, then flags.
pub(crate) fn resolve_config(input: Option<&InputArgs>, model: Option<&ModelArgs>) -> anyhow::Result<Config> {
    let mut cfg = Config::from_env()?;
    if let Some(i) = input {
        if let Some(d) = &i.template_dir {
            cfg.template_dir = d.clone();
        }
        if let Some(t) = &i.template {
            cfg.template = t.clone();
        }
        if let Some(d) = &i.data {
            cfg.data_file = d.clone();
        }
    }
    if let Some(m) = model {
        if let Some(v) = &m.model {
            cfg.model = v.clone();
        }
        if let Some(h) = &m.host {
            cfg.host = h.clone();
        }
        if let Some(s) = m.timeout_secs {
            cfg.timeout = std::time::Duration::from_secs(s);
        }
    }
    Ok(cfg)
}

pub(crate) fn load_validator(rules: Option<&PathBuf>) -> anyhow::Result<CrossValidator> {
    match rules {
        Some(p) => {
            let sources = SimulatedSource::from_json_file(p)
                .map_err(|e| anyhow::anyhow!("failed to load rules from {}: {}", p.display(), e))?;
            Ok(CrossValidator::simulated(sources))
        }
        None => Ok(CrossValidator::default()),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match &cli.command {
        Commands::Run { input, model, rules, markers, json } => {
            let cfg = resolve_config(Some(input), Some(model))?;
            let validator = load_validator(rules.as_ref())?;
            cmd::run::run(&cfg, &validator, markers, *json)?;
        }
        Commands::Render { input } => {
            let cfg = resolve_config(Some(input), None)?;
            cmd::run::render(&cfg)?;
        }
        Commands::Repair { input, markers, json } => {
            cmd::repair::repair(input.as_deref(), markers, *json)?;
        }
        Commands::Assess { query, rules, json } => {
            let validator = load_validator(rules.as_ref())?;
            cmd::assess::assess(&validator, query, *json)?;
        }
        Commands::Urls { query } => {
            cmd::assess::urls(query);
        }
        Commands::Check { model } => {
            let cfg = resolve_config(None, Some(model))?;
            cmd::check::check(&cfg)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "urlfinder", "run", "--model", "mistral", "--data", "rows.csv", "--timeout-secs", "9", "--json",
        ])
        .unwrap();
        let Commands::Run { input, model, json, .. } = &cli.command else { panic!("expected run") };
        assert!(*json);
        let cfg = resolve_config(Some(input), Some(model)).unwrap();
        assert_eq!(cfg.model, "mistral");
        assert_eq!(cfg.data_file, PathBuf::from("rows.csv"));
        assert_eq!(cfg.timeout, std::time::Duration::from_secs(9));
    }

    #[test]
    fn assess_requires_a_query() {
        assert!(Cli::try_parse_from(["urlfinder", "assess"]).is_err());
        let cli = Cli::try_parse_from(["urlfinder", "assess", "--query", "a", "--query", "b"]).unwrap();
        let Commands::Assess { query, .. } = cli.command else { panic!("expected assess") };
        assert_eq!(query, vec!["a", "b"]);
    }

    #[test]
    fn markers_are_repeatable_and_optional() {
        let cli = Cli::try_parse_from(["urlfinder", "run", "--marker", "Rating", "--marker", "Search"]).unwrap();
        let Commands::Run { markers, .. } = cli.command else { panic!("expected run") };
        assert_eq!(markers, vec!["Rating", "Search"]);
        let cli = Cli::try_parse_from(["urlfinder", "repair"]).unwrap();
        let Commands::Repair { markers, .. } = cli.command else { panic!("expected repair") };
        assert!(markers.is_empty());
    }
}
