//! `ctxkeeper tokens`: Count tokens in text.

use std::io::Read;

use ctxkeeper_context::TokenCounter;

use super::{CmdResult, load_config};

pub async fn run(text: Option<String>) -> CmdResult {
    let config = load_config()?;
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let counter = TokenCounter::from_config(&config.tokenizer);
    println!("{}", counter.count_tokens(&text));
    if !counter.is_exact() {
        eprintln!("(approximate: chars / 4)");
    }
    Ok(())
}
