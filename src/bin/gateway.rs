//! profrag gateway - HTTP chat endpoint
//!
//! Serves `POST /chat` and `GET /health`. Embedding backfill runs separately
//! (`profrag backfill`).

use clap::Parser;
use profrag::config::{load_config, validate_config};
use profrag::core::{CorpusStore, EmbeddingProvider, GenerationOptions, GenerationProvider};
use profrag::database::{init_pool, PgCorpusStore};
use profrag::gateway::{router, AppState};
use profrag::generation::GeminiClient;
use profrag::retrieval::GeminiEmbeddingClient;
use profrag::{logging, ChatService, VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "profrag-gateway", version = VERSION, about = "profrag HTTP gateway")]
struct Args {
    /// Config file (defaults to PROFRAG_CONFIG or the user config dir)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Bind address (overrides gateway.bind)
    #[arg(long)]
    bind: Option<String>,

    /// Port (overrides gateway.port)
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    logging::init(&config.log);

    if let Some(bind) = args.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    let validation = validate_config(&config);
    for warning in &validation.warnings {
        warn!("Config: {}", warning);
    }
    config.require()?;
    if !validation.valid {
        let errors: Vec<String> = validation.errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }

    // External clients, constructed once and shared by every request
    let pool = init_pool(&config.database).await?;
    let store: Arc<dyn CorpusStore> =
        Arc::new(PgCorpusStore::new(pool, config.retrieval.dimensions));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbeddingClient::new(
        &config.google,
        config.retrieval.dimensions,
    )?);
    let generator: Arc<dyn GenerationProvider> = Arc::new(
        GeminiClient::new(&config.google)?.with_options(GenerationOptions {
            temperature: config.generation.temperature,
            max_output_tokens: config.generation.max_output_tokens,
        }),
    );

    let stats = store.stats().await?;
    info!(
        total = stats.total,
        embedded = stats.embedded,
        pending = stats.pending(),
        "Corpus loaded"
    );

    let chat = ChatService::from_config(&config, store.clone(), embedder.clone(), generator)?;
    let app = router(AppState {
        chat: Arc::new(chat),
        store,
        embedder,
    });

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!(
        version = VERSION,
        embedding_model = %config.google.embedding_model,
        generation_model = %config.google.generation_model,
        "Gateway listening on http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
