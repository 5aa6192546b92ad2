use anyhow::Result;
use clap::Parser;
use rag_chain::LlmConfig;
use rag_chat::{startup_exit_code, AppContext, ChatConfig, Repl};
use rag_data_services::{EmbedderKind, IngestConfig};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "rag-chat")]
#[command(about = "Ask questions about a folder of documents")]
struct Cli {
    /// Directory scanned for documents
    #[arg(long, default_value = "documents")]
    documents_dir: PathBuf,

    /// Glob selecting files relative to the documents directory
    #[arg(long, default_value = "**/*.docx")]
    glob: String,

    /// Maximum chunk length in characters
    #[arg(long, default_value = "1500")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value = "350")]
    chunk_overlap: usize,

    /// Local vector store persistence directory
    #[arg(long, default_value = "chroma-db")]
    persist_dir: PathBuf,

    /// Collection name
    #[arg(long, default_value = "collections")]
    collection: String,

    /// Use Qdrant at this URL instead of the local store
    #[arg(long)]
    qdrant_url: Option<String>,

    /// Embedding model (fastembed, hashing)
    #[arg(long, default_value = "fastembed")]
    embedder: EmbedderKind,

    /// Directory for downloaded embedding models
    #[arg(long)]
    model_cache_dir: Option<PathBuf>,

    /// Chunks retrieved per question
    #[arg(long, default_value = "4")]
    top_k: usize,

    /// Chat model name
    #[arg(long, default_value = "llama3-70b-8192")]
    model: String,

    /// Sampling temperature
    #[arg(long, default_value = "0.7")]
    temperature: f32,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = "https://api.groq.com/openai/v1")]
    api_base: String,

    /// Maximum tokens per answer
    #[arg(long, default_value = "1024")]
    max_tokens: u32,

    /// Answer from the existing collection without ingesting
    #[arg(long)]
    skip_ingest: bool,

    /// Print retrieved chunks under each answer
    #[arg(long)]
    show_sources: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> ChatConfig {
        ChatConfig {
            ingest: IngestConfig {
                documents_dir: self.documents_dir,
                glob: self.glob,
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
                persist_dir: self.persist_dir,
                collection: self.collection,
                qdrant_url: self.qdrant_url,
                embedder: self.embedder,
                model_cache_dir: self.model_cache_dir,
            },
            llm: LlmConfig {
                model: self.model,
                temperature: self.temperature,
                api_base: Some(self.api_base),
                max_tokens: self.max_tokens,
                ..Default::default()
            },
            top_k: self.top_k,
            skip_ingest: self.skip_ingest,
            show_sources: self.show_sources,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging; stdout carries only the conversation
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "rag_chat={},rag_chain={},rag_data_services={}",
                cli.log_level, cli.log_level, cli.log_level
            ))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("🚀 Document Q&A Starting");
    tracing::info!("Configuration:");
    tracing::info!("  Documents: {} ({})", cli.documents_dir.display(), cli.glob);
    tracing::info!("  Collection: {}", cli.collection);
    tracing::info!("  Model: {} (top_k={})", cli.model, cli.top_k);

    let config = cli.into_config();
    let app = match AppContext::build(config).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(startup_exit_code(&e));
        }
    };

    let mut repl = Repl::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        app.config.show_sources,
    );
    let asked = repl.run(&app.qa).await?;

    tracing::info!("Session ended after {} questions", asked);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_match_config_defaults() {
        let config = Cli::parse_from(["rag-chat"]).into_config();
        let defaults = ChatConfig::default();

        assert_eq!(config.ingest.documents_dir, defaults.ingest.documents_dir);
        assert_eq!(config.ingest.glob, defaults.ingest.glob);
        assert_eq!(config.ingest.chunk_size, defaults.ingest.chunk_size);
        assert_eq!(config.ingest.chunk_overlap, defaults.ingest.chunk_overlap);
        assert_eq!(config.ingest.persist_dir, defaults.ingest.persist_dir);
        assert_eq!(config.ingest.collection, defaults.ingest.collection);
        assert_eq!(config.top_k, defaults.top_k);
        assert_eq!(config.llm.model, defaults.llm.model);
        assert_eq!(config.llm.temperature, defaults.llm.temperature);
        assert_eq!(config.llm.api_base(), defaults.llm.api_base());
        assert_eq!(config.api_key_env, "GROQ_API_KEY");
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Cli::parse_from([
            "rag-chat",
            "--documents-dir",
            "handbook",
            "--top-k",
            "2",
            "--model",
            "mixtral-8x7b-32768",
            "--skip-ingest",
            "--show-sources",
        ])
        .into_config();

        assert_eq!(config.ingest.documents_dir, PathBuf::from("handbook"));
        assert_eq!(config.top_k, 2);
        assert_eq!(config.llm.model, "mixtral-8x7b-32768");
        assert!(config.skip_ingest);
        assert!(config.show_sources);
    }
}
