//! `ctxkeeper models`: List known models.

use ctxkeeper_config::AppConfig;
use ctxkeeper_providers::OpenAiCompatProvider;
use ctxkeeper_core::Provider;

use super::{CmdResult, load_config};

pub async fn run(remote: bool) -> CmdResult {
    let config = load_config()?;
    let registry = config.model_registry();

    println!("Known Models");
    println!("============");
    println!("  {:<20} {:>8}  {:<24} Capabilities", "Model", "Window", "Recommended");
    for (id, info) in registry.iter() {
        let marker = if *id == config.default_model { "*" } else { " " };
        println!(
            "{marker} {:<20} {:>8}  {:<24} {}",
            id,
            info.context_window,
            info.recommendation,
            info.capabilities.join(", ")
        );
    }
    println!(
        "\n  Unknown models use a {}-token window.",
        config.context.default_context_window
    );

    if remote {
        print_remote(&config).await?;
    }

    Ok(())
}

async fn print_remote(config: &AppConfig) -> CmdResult {
    let provider = OpenAiCompatProvider::from_config(&config.provider)?;
    println!("\nServed by {}", provider.base_url());
    match provider.list_models().await {
        Ok(models) if models.is_empty() => println!("  (no models reported)"),
        Ok(models) => {
            for model in models {
                println!("  - {model}");
            }
        }
        Err(e) => println!("  ❌ Could not list models: {e}"),
    }
    Ok(())
}
