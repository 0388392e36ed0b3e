//! ctxkeeper CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Create the config directory and a default config
//! - `status`: Show configuration and backend health
//! - `models`: List known models and their context windows
//! - `new`/`list`/`delete-conversation`: Manage conversations
//! - `chat`: Send a message, or chat interactively
//! - `context`: Show how a conversation fits a model's window
//! - `ingest`/`docs`/`search`/`forget`: Manage conversation documents
//! - `tokens`: Count tokens in a piece of text

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ctxkeeper",
    about = "ctxkeeper — local chat with context compaction and document retrieval",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config directory and a default config.toml
    Onboard,

    /// Show configuration, storage and provider status
    Status,

    /// List known models with their context windows
    Models {
        /// Also ask the provider which models it serves
        #[arg(long)]
        remote: bool,
    },

    /// Start a new conversation
    New {
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List conversations, most recently active first
    List,

    /// Chat within a conversation
    Chat {
        conversation: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short = 'M', long)]
        message: Option<String>,

        /// Model to answer with (defaults to `default_model`)
        #[arg(short, long)]
        model: Option<String>,

        /// Augment the prompt with the conversation's documents
        #[arg(long)]
        rag: bool,

        /// Attach an image file to the message
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },

    /// Show the token budget of a conversation for a model
    Context {
        conversation: String,

        #[arg(short, long)]
        model: Option<String>,

        /// Plan the context now, summarizing if needed
        #[arg(long)]
        compact: bool,
    },

    /// Add a document (txt, md, pdf, docx) to a conversation
    Ingest {
        conversation: String,
        file: PathBuf,
    },

    /// List the documents of a conversation
    Docs { conversation: String },

    /// Find the document chunks closest to a query
    Search {
        conversation: String,
        query: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Delete a document and its chunks
    Forget { document: String },

    /// Count tokens in text (reads stdin when no text is given)
    Tokens { text: Option<String> },

    /// Delete a conversation with its messages, documents and summaries
    DeleteConversation { conversation: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Models { remote } => commands::models::run(remote).await?,
        Commands::New { title } => commands::conversation::create(title).await?,
        Commands::List => commands::conversation::list().await?,
        Commands::Chat {
            conversation,
            message,
            model,
            rag,
            images,
        } => commands::chat::run(conversation, message, model, rag, images).await?,
        Commands::Context {
            conversation,
            model,
            compact,
        } => commands::context::run(conversation, model, compact).await?,
        Commands::Ingest { conversation, file } => commands::documents::ingest(conversation, file).await?,
        Commands::Docs { conversation } => commands::documents::list(conversation).await?,
        Commands::Search {
            conversation,
            query,
            top_k,
        } => commands::documents::search(conversation, query, top_k).await?,
        Commands::Forget { document } => commands::documents::forget(document).await?,
        Commands::Tokens { text } => commands::tokens::run(text).await?,
        Commands::DeleteConversation { conversation } => {
            commands::conversation::delete(conversation).await?
        }
    }

    Ok(())
}
