use std::io::{self, Read};
use std::path::Path;
use tracing::info;
use urlfinder_core::repair::DEFAULT_MARKERS;
use urlfinder_core::{extract_queries, parse_lenient, Query};

fn read_input(input: Option<&Path>) -> anyhow::Result<String> {
    match input {
        Some(p) => std::fs::read_to_string(p)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", p.display(), e)),
        None => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s)?;
            Ok(s)
        }
    }
}

pub fn repair(input: Option<&Path>, markers: &[String], json: bool) -> anyhow::Result<()> {
    let raw = read_input(input)?;
    let parsed = parse_lenient(&raw).map_err(|e| anyhow::anyhow!("{}\n{}", e, raw.trim()))?;
    let markers: Vec<&str> = if markers.is_empty() {
        DEFAULT_MARKERS.to_vec()
    } else {
        markers.iter().map(String::as_str).collect()
    };
    let queries: Vec<Query> = extract_queries(parsed.value(), &markers)
        .iter()
        .map(|q| Query::new(q, 0))
        .collect();
    if json {
        let out = serde_json::json!({
            "repaired": parsed.was_repaired(),
            "value": parsed.value(),
            "queries": queries,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", serde_json::to_string_pretty(parsed.value())?);
        if parsed.was_repaired() {
            info!("input was not valid JSON; repaired");
        }
        for q in &queries {
            println!("query: {}  ({})", q.raw, q.sanitized);
        }
    }
    Ok(())
}
