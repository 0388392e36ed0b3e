//! `ctxkeeper onboard`: First-time setup.

use ctxkeeper_config::AppConfig;

use super::CmdResult;

pub async fn run() -> CmdResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("ctxkeeper — First-Time Setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Start Ollama and pull a model: ollama pull llama3.2");
        println!("   2. Pull the embedding model:     ollama pull nomic-embed-text:v1.5");
        println!("   3. Run: ctxkeeper new --title \"My first chat\"\n");
    }

    println!("🎉 Setup complete! Run `ctxkeeper status` to check the connection.\n");

    Ok(())
}
