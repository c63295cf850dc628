use serde::Serialize;
use tracing::info;
use urlfinder_core::{
    load_rows, summarize, Config, CrossValidator, ItemReport, OllamaClient, Outcome, Pipeline,
    RunSummary, Template, ValidationResult,
};

#[derive(Serialize)]
struct RunEnvelope<'a> {
    model: &'a str,
    host: &'a str,
    summary: RunSummary,
    results: &'a [ItemReport],
}

fn load_prompts(cfg: &Config) -> anyhow::Result<Vec<String>> {
    info!(
        "Loading data from '{}' and template '{}'...",
        cfg.data_file.display(),
        cfg.template_path().display()
    );
    let template = Template::load(&cfg.template_dir, &cfg.template)?;
    let rows = load_rows(&cfg.data_file)?;
    Ok(template.render_all(&rows))
}

pub fn render(cfg: &Config) -> anyhow::Result<()> {
    let prompts = load_prompts(cfg)?;
    for (i, p) in prompts.iter().enumerate() {
        println!("--- Prompt {} ---", i + 1);
        println!("{}", p.trim());
    }
    Ok(())
}

pub fn run(cfg: &Config, validator: &CrossValidator, markers: &[String], json: bool) -> anyhow::Result<()> {
    let prompts = load_prompts(cfg)?;
    let client = OllamaClient::new(cfg)?;
    let mut pipeline = Pipeline::new(&client, validator);
    if !markers.is_empty() {
        pipeline = pipeline.with_markers(markers.to_vec());
    }

    let mut reports = Vec::with_capacity(prompts.len());
    for (i, prompt) in prompts.iter().enumerate() {
        let report = pipeline.process_prompt(i, prompt);
        if !json {
            print_report(&report);
        }
        reports.push(report);
    }

    let summary = summarize(&reports);
    if json {
        let envelope = RunEnvelope { model: client.model(), host: client.host(), summary, results: &reports };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!(
            "\n=== {} items: {} validated ({} repaired), {} model errors, {} parse failures, {} without query ===",
            summary.items,
            summary.validated,
            summary.repaired,
            summary.model_unavailable,
            summary.parse_failed,
            summary.no_query
        );
        println!("Confidence: HIGH {} | MEDIUM {} | LOW {}", summary.high, summary.medium, summary.low);
    }
    Ok(())
}

pub(crate) fn print_validation(r: &ValidationResult) {
    println!("Extracted Query: {}", r.query.raw);
    println!("\n[ Confidence: {} ]", r.confidence);
    println!("Validation Summary: {}", r.summary());
    println!("\nVerification Links (Copy & Paste to Check):");
    for v in &r.verdicts {
        println!("  {}: {}", v.engine.label(), v.url);
    }
}

fn print_report(report: &ItemReport) {
    println!("\n--- Processing Business {} ---", report.index + 1);
    match &report.outcome {
        Outcome::Validated { results, .. } => {
            for (n, r) in results.iter().enumerate() {
                if n > 0 {
                    println!();
                }
                print_validation(r);
            }
        }
        Outcome::ModelUnavailable { message } => println!("OLLAMA_ERROR: {}", message),
        Outcome::ParseFailed { raw, reason } => {
            println!("CRITICAL ERROR: Failed to parse or repair JSON ({}). Raw output:\n{}", reason, raw)
        }
        Outcome::NoQuery { parsed } => {
            println!("Could not reliably extract the query. Data received: {}", parsed)
        }
    }
}
