use urlfinder_core::{CrossValidator, Engine, Query};

pub fn assess(validator: &CrossValidator, queries: &[String], json: bool) -> anyhow::Result<()> {
    let results: Vec<_> = queries
        .iter()
        .enumerate()
        .map(|(i, q)| validator.assess(&Query::new(q, i)))
        .collect();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({"count": results.len(), "results": results}))?
        );
    } else {
        for (i, r) in results.iter().enumerate() {
            if i > 0 {
                println!();
            }
            super::run::print_validation(r);
        }
    }
    Ok(())
}

pub fn urls(query: &str) {
    let q = Query::new(query, 0);
    for e in Engine::ALL {
        println!("  {}: {}", e.label(), e.search_url(&q.sanitized));
    }
}
