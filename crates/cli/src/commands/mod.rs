pub mod chat;
pub mod context;
pub mod conversation;
pub mod documents;
pub mod models;
pub mod onboard;
pub mod status;
pub mod tokens;

use ctxkeeper::App;
use ctxkeeper_config::AppConfig;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub async fn open_app() -> Result<App, Box<dyn std::error::Error>> {
    let config = load_config()?;
    Ok(App::from_config(config).await?)
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}…")
    }
}
