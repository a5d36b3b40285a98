//! # ragchat CLI
//!
//! Ask questions about your documents from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! ragchat --config ./config/ragchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragchat chat` | Interactive chat with slash commands |
//! | `ragchat ask "<q>" --source <s>` | One-shot answer over the given sources |
//! | `ragchat search "<q>" --source <s>` | Rank sources against a query |
//! | `ragchat extract <s>` | Print the text extracted from a file or URL |
//! | `ragchat models` | List configured models |
//!
//! Sources are `.pdf` / `.docx` paths or `http(s)://` URLs.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use ragchat::progress::ProgressMode;
use ragchat::session::Session;
use ragchat::{chat, cli, config, logging};

/// ragchat: retrieval-augmented chat over PDF, Word, and web documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Defaults apply when the file does not exist.
#[derive(Parser)]
#[command(name = "ragchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragchat.toml")]
    config: PathBuf,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Embedding progress on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session.
    ///
    /// Sources given here are ingested, embedded, and indexed before the
    /// first prompt. More can be added with `/add`.
    Chat {
        /// File path or URL to ingest (repeatable).
        #[arg(long = "source", short = 's')]
        sources: Vec<String>,

        /// LLM model to use (must be in the configured catalogue).
        #[arg(long)]
        model: Option<String>,

        /// API key for the chat-completion service. Overrides config and env.
        #[arg(long, env = "RAGCHAT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Answer a single question over the given sources.
    Ask {
        question: String,

        #[arg(long = "source", short = 's')]
        sources: Vec<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long, env = "RAGCHAT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Rank the given sources against a query without calling the LLM.
    Search {
        query: String,

        #[arg(long = "source", short = 's', required = true)]
        sources: Vec<String>,

        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(short)]
        k: Option<usize>,
    },

    /// Print the plain text extracted from a file or URL.
    Extract { source: String },

    /// List the configured LLM and embedding models.
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    logging::init(cli.verbose);

    let cfg = config::load_or_default(&cli.config)?;
    let progress = cli
        .progress
        .map(ProgressMode::from)
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Chat {
            sources,
            model,
            api_key,
        } => {
            let key = cli::resolve_api_key(api_key.as_deref(), &cfg);
            let mut session = Session::new(&cfg, key)?;
            if let Some(model) = model {
                session.select_model(&model)?;
            }
            cli::prepare_session(&mut session, &sources, progress.as_ref()).await?;
            chat::run_chat(&mut session, progress.as_ref()).await?;
        }
        Commands::Ask {
            question,
            sources,
            model,
            api_key,
        } => {
            let key = cli::resolve_api_key(api_key.as_deref(), &cfg);
            cli::run_ask(
                &cfg,
                &question,
                &sources,
                model.as_deref(),
                key,
                progress.as_ref(),
            )
            .await?;
        }
        Commands::Search { query, sources, k } => {
            cli::run_search(&cfg, &query, &sources, k, progress.as_ref()).await?;
        }
        Commands::Extract { source } => {
            cli::run_extract(&cfg, &source).await?;
        }
        Commands::Models => {
            cli::run_models(&cfg)?;
        }
    }

    Ok(())
}
