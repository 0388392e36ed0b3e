//! `ctxkeeper status`: Show configuration and backend health.

use ctxkeeper_config::AppConfig;

use super::{CmdResult, load_config};

pub async fn run() -> CmdResult {
    let config = load_config()?;

    println!("ctxkeeper Status");
    println!("================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {} ({})", config.provider.kind, config.provider.api_url);
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.default_temperature);
    println!(
        "  Embeddings:   {} ({} dims)",
        config.provider.embedding_model, config.provider.embedding_dimension
    );
    println!("  Database:     {}", config.database.backend);
    println!("  Tokenizer:    {}", config.tokenizer.encoding);
    println!(
        "  Compaction:   at {:.0}% of window, keep {:.0}% recent",
        config.context.trigger_fraction * 100.0,
        config.context.compression_ratio * 100.0
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `ctxkeeper onboard` first");
    }

    let app = match ctxkeeper::App::from_config(config).await {
        Ok(app) => app,
        Err(e) => {
            println!("  ❌ Startup failed: {e}");
            return Ok(());
        }
    };

    match app.list_conversations().await {
        Ok(conversations) => println!(
            "  ✅ Storage ready ({}, {} conversations)",
            app.stores.backend,
            conversations.len()
        ),
        Err(e) => println!("  ❌ Storage error: {e}"),
    }

    match app.provider.health_check().await {
        Ok(true) => println!("  ✅ Provider reachable"),
        Ok(false) => println!("  ⚠️  Provider responded but reports unhealthy"),
        Err(e) => println!("  ❌ Provider unreachable: {e}"),
    }

    if !app.counter().is_exact() {
        println!("  ⚠️  Token counts are approximate (chars / 4)");
    }

    Ok(())
}
