use urlfinder_core::{Config, OllamaClient};

pub fn check(cfg: &Config) -> anyhow::Result<()> {
    let client = OllamaClient::new(cfg)?;
    if !client.is_available() {
        anyhow::bail!("Ollama is not reachable at {} (try `ollama serve`)", client.host());
    }
    println!("Ollama reachable at {} (model: {})", client.host(), client.model());
    Ok(())
}
