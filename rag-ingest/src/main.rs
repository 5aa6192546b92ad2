use anyhow::Result;
use clap::Parser;
use rag_data_services::{EmbedderKind, IngestConfig};
use std::path::PathBuf;
use tracing::{info, Level};

/// Document Ingestion CLI
///
/// Loads documents from a directory, splits them into overlapping chunks,
/// embeds them and stores the vectors for question answering.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory scanned for documents
    #[arg(short = 'd', long, default_value = "documents")]
    documents_dir: PathBuf,

    /// Glob selecting files relative to the documents directory
    #[arg(short = 'g', long, default_value = "**/*.docx")]
    glob: String,

    /// Maximum chunk length in characters
    #[arg(long, default_value = "1500")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value = "350")]
    chunk_overlap: usize,

    /// Local persistence directory
    #[arg(short = 'p', long, default_value = "chroma-db")]
    persist_dir: PathBuf,

    /// Collection name
    #[arg(short = 'c', long, default_value = "collections")]
    collection: String,

    /// Qdrant URL; when set, chunks go to Qdrant instead of the local store
    #[arg(short = 'q', long)]
    qdrant_url: Option<String>,

    /// Embedding model (fastembed, hashing)
    #[arg(short = 'e', long, default_value = "fastembed")]
    embedder: EmbedderKind,

    /// Directory for downloaded embedding models
    #[arg(long)]
    model_cache_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Parse log level from string
    fn parse_log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn into_config(self) -> IngestConfig {
        IngestConfig {
            documents_dir: self.documents_dir,
            glob: self.glob,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            persist_dir: self.persist_dir,
            collection: self.collection,
            qdrant_url: self.qdrant_url,
            embedder: self.embedder,
            model_cache_dir: self.model_cache_dir,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(args.parse_log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("🚀 Document Ingestion Tool");
    info!("==========================");

    let config = args.into_config();

    info!("Configuration:");
    info!("  Documents: {} ({})", config.documents_dir.display(), config.glob);
    info!(
        "  Chunking: size={}, overlap={}",
        config.chunk_size, config.chunk_overlap
    );
    match &config.qdrant_url {
        Some(url) => info!("  Qdrant URL: {}", url),
        None => info!("  Persist dir: {}", config.persist_dir.display()),
    }
    info!("  Collection: {}", config.collection);
    info!("  Embedder: {}", config.embedder);
    info!("");

    config.check_documents_dir()?;

    info!("Initializing ingestion pipeline...");
    let vector_store = config.open_vector_store().await?;
    let embedder = config.load_embedder()?;
    let pipeline = config.build_pipeline(embedder, vector_store.clone())?;

    info!("Pipeline initialized successfully");
    info!("");

    let stats = pipeline.run().await?;
    let total = vector_store.count().await?;

    info!("");
    info!("✅ Ingestion Complete!");
    info!("=====================");
    info!(
        "  {} documents loaded, {} failed",
        stats.documents_loaded, stats.documents_failed
    );
    info!(
        "  {} chunks, {} embeddings, {} points added, {} already present",
        stats.chunks_created, stats.embeddings_generated, stats.points_added, stats.points_skipped
    );
    info!("  {} points in collection", total);

    Ok(())
}
