//! One-shot command handlers for the `ragchat` binary.
//!
//! Results go to stdout; logs and progress go to stderr.

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::extract::{self, Source, UrlFetcher};
use crate::llm::ApiKey;
use crate::progress::EmbedProgressReporter;
use crate::prompt::truncate_chars;
use crate::session::Session;

const SNIPPET_CHARS: usize = 160;

/// Resolve the API key: explicit flag, then config, then `GROQ_API_KEY`
/// (which may come from a `.env` file).
pub fn resolve_api_key(flag: Option<&str>, config: &Config) -> Option<ApiKey> {
    flag.and_then(ApiKey::new)
        .or_else(|| config.llm.api_key.as_deref().and_then(ApiKey::new))
        .or_else(ApiKey::from_env)
}

/// Ingest every source, then embed and index the corpus.
///
/// With no sources the session is left empty and unindexed.
pub async fn prepare_session(
    session: &mut Session,
    sources: &[String],
    progress: &dyn EmbedProgressReporter,
) -> Result<()> {
    for source in sources {
        session
            .ingest(source)
            .await
            .with_context(|| format!("Failed to ingest {}", source))?;
    }
    if !sources.is_empty() {
        session.generate_embeddings(progress).await?;
        session.build_index()?;
    }
    Ok(())
}

pub async fn run_extract(config: &Config, source: &str) -> Result<()> {
    let text = match Source::parse(source) {
        Source::File(path) => extract::extract_file(&path)?,
        Source::Url(url) => UrlFetcher::new(&config.fetch)?.fetch_text(&url).await?,
    };
    println!("{}", text);
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    sources: &[String],
    k: Option<usize>,
    progress: &dyn EmbedProgressReporter,
) -> Result<()> {
    if sources.is_empty() {
        bail!("search needs at least one --source");
    }
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let mut session = Session::new(config, None)?;
    prepare_session(&mut session, sources, progress).await?;

    let k = k.unwrap_or(config.retrieval.top_k);
    let hits = session.search(query, k).await?;
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        let doc = &session.documents()[hit.ordinal];
        println!(
            "{}. [{}] {:.4}  {}",
            rank + 1,
            hit.ordinal,
            hit.distance,
            doc.origin
        );
        let snippet = truncate_chars(&doc.text, SNIPPET_CHARS).replace('\n', " ");
        println!("    {}", snippet.trim());
    }
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    question: &str,
    sources: &[String],
    model: Option<&str>,
    api_key: Option<ApiKey>,
    progress: &dyn EmbedProgressReporter,
) -> Result<()> {
    let mut session = Session::new(config, api_key)?;
    if let Some(model) = model {
        session.select_model(model)?;
    }
    prepare_session(&mut session, sources, progress).await?;
    let answer = session.ask(question).await?;
    println!("{}", answer);
    Ok(())
}

pub fn run_models(config: &Config) -> Result<()> {
    println!("LLM models:");
    for m in &config.llm.models {
        let marker = if *m == config.llm.model { "*" } else { " " };
        println!("  {} {}", marker, m);
    }
    println!("Embedding model:");
    println!(
        "    {} ({})",
        config.embedding.model_name(),
        config.embedding.provider
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_key_wins_over_config() {
        let mut config = Config::minimal();
        config.llm.api_key = Some("from-config".to_string());
        let key = resolve_api_key(Some("from-flag"), &config).unwrap();
        assert_eq!(key.expose(), "from-flag");
    }

    #[test]
    fn config_key_used_when_no_flag() {
        let mut config = Config::minimal();
        config.llm.api_key = Some("from-config".to_string());
        assert_eq!(
            resolve_api_key(None, &config).unwrap().expose(),
            "from-config"
        );
    }

    #[test]
    fn blank_flag_falls_through() {
        let mut config = Config::minimal();
        config.llm.api_key = Some("from-config".to_string());
        assert_eq!(
            resolve_api_key(Some("  "), &config).unwrap().expose(),
            "from-config"
        );
    }
}
