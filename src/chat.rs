//! Interactive chat loop.
//!
//! Reads lines from stdin. Lines starting with `/` are commands; anything
//! else is a question for the assistant. Pipeline errors are printed and
//! the loop carries on with its state intact.

use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::export::{self, DEFAULT_EXPORT_FILE};
use crate::progress::EmbedProgressReporter;
use crate::session::Session;

const HELP: &str = "\
Commands:
  /add <path|url>   ingest a PDF, DOCX, or web page
  /embed            generate embeddings for all documents
  /index            build the search index
  /sources          list processed files and URLs
  /summary          summarise all documents
  /export [path]    write the chat transcript (default chat_history.txt)
  /model [name]     show or switch the LLM model
  /clear            delete all documents and chat history
  /help             show this help
  /quit             exit
Anything else is sent as a question.";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Add(String),
    Embed,
    Index,
    Sources,
    Summary,
    Export(Option<PathBuf>),
    Model(Option<String>),
    Clear,
    Help,
    Quit,
    Ask(String),
    Empty,
    Unknown(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatCommand::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return ChatCommand::Ask(line.to_string());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };
        match (name, arg) {
            ("add", Some(src)) => ChatCommand::Add(src.to_string()),
            ("embed", _) => ChatCommand::Embed,
            ("index", _) => ChatCommand::Index,
            ("sources", _) => ChatCommand::Sources,
            ("summary", _) => ChatCommand::Summary,
            ("export", path) => ChatCommand::Export(path.map(PathBuf::from)),
            ("model", name) => ChatCommand::Model(name.map(str::to_string)),
            ("clear", _) => ChatCommand::Clear,
            ("help", _) => ChatCommand::Help,
            ("quit" | "exit", _) => ChatCommand::Quit,
            _ => ChatCommand::Unknown(line.to_string()),
        }
    }
}

/// Run the loop until `/quit` or end of input.
pub async fn run_chat(
    session: &mut Session,
    progress: &dyn EmbedProgressReporter,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    if !session.has_api_key() {
        println!("Warning: no API key configured; set GROQ_API_KEY or pass --api-key.");
    }
    println!("Type a question, or /help for commands.");

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !handle_line(session, &line, progress).await {
            break;
        }
    }
    Ok(())
}

/// Execute one input line. Returns `false` when the loop should stop.
pub async fn handle_line(
    session: &mut Session,
    line: &str,
    progress: &dyn EmbedProgressReporter,
) -> bool {
    match ChatCommand::parse(line) {
        ChatCommand::Empty => {}
        ChatCommand::Quit => return false,
        ChatCommand::Help => println!("{}", HELP),
        ChatCommand::Add(src) => match session.ingest(&src).await {
            Ok(ordinal) => println!("Processed '{}' as document {}.", src, ordinal),
            Err(e) => println!("Error: {}", e),
        },
        ChatCommand::Embed => match session.generate_embeddings(progress).await {
            Ok(n) => println!("Generated embeddings for {} documents.", n),
            Err(e) => println!("Error: {}", e),
        },
        ChatCommand::Index => match session.build_index() {
            Ok(n) => println!("Search index built over {} documents.", n),
            Err(e) => println!("Error: {}", e),
        },
        ChatCommand::Sources => print_sources(session),
        ChatCommand::Summary => match session.summarize().await {
            Ok(summary) => println!("{}", summary),
            Err(e) => println!("Error: {}", e),
        },
        ChatCommand::Export(path) => {
            let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
            match export::write_transcript(&path, session.transcript()) {
                Ok(0) => println!("No chat history to export."),
                Ok(n) => println!("Exported {} lines to {}.", n, path.display()),
                Err(e) => println!("Error: {:#}", e),
            }
        }
        ChatCommand::Model(None) => {
            for m in session.available_models() {
                let marker = if m == session.model() { "*" } else { " " };
                println!("{} {}", marker, m);
            }
        }
        ChatCommand::Model(Some(name)) => match session.select_model(&name) {
            Ok(()) => println!("Using model {}.", name),
            Err(e) => println!("Error: {}", e),
        },
        ChatCommand::Clear => {
            session.clear();
            println!("All data cleared.");
        }
        ChatCommand::Ask(question) => match session.ask(&question).await {
            Ok(answer) => println!("{}", answer),
            Err(e) => println!("Error: {}", e),
        },
        ChatCommand::Unknown(line) => println!("Unknown command: {} (try /help)", line),
    }
    true
}

fn print_sources(session: &Session) {
    let files = session.processed_files();
    let urls = session.processed_urls();
    if files.is_empty() && urls.is_empty() {
        println!("No documents processed yet.");
        return;
    }
    if !files.is_empty() {
        println!("Processed files:");
        for f in files {
            println!("- {}", f);
        }
    }
    if !urls.is_empty() {
        println!("Processed URLs:");
        for u in urls {
            println!("- {}", u);
        }
    }
    if session.is_index_stale() {
        println!("(index is out of date: run /embed then /index)");
    }
}
