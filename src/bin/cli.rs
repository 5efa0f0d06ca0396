//! profrag CLI
//!
//! Database setup, corpus ingestion and one-off questions from the terminal.

use clap::{Parser, Subcommand};
use console::style;
use futures::StreamExt;
use profrag::config::{load_config, validate_config, Config};
use profrag::core::{
    Conversation, CorpusStore, EmbeddingProvider, GenerationOptions, GenerationProvider, Message,
};
use profrag::database::{init_pool, init_pool_for_migrations, migrations, PgCorpusStore};
use profrag::generation::GeminiClient;
use profrag::ingest::{self, Backfiller};
use profrag::retrieval::GeminiEmbeddingClient;
use profrag::{logging, ChatService, VERSION};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "profrag",
    author = "profrag Contributors",
    version = VERSION,
    about = "profrag - answer questions about professors from student reviews",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to PROFRAG_CONFIG or the user config dir)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the pgvector extension, the reviews table and its indexes
    Migrate,

    /// Load reviews from a JSON file
    Seed {
        /// Path to a `{"reviews": [...]}` file
        file: PathBuf,

        /// Embed while inserting instead of leaving it to the backfill
        #[arg(long)]
        embed: bool,
    },

    /// Compute embeddings for reviews stored without one
    Backfill,

    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// Print the answer only once it is complete
        #[arg(long)]
        no_stream: bool,
    },

    /// Show configuration and corpus status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    logging::init(&config.log);

    match cli.command {
        Commands::Migrate => cmd_migrate(&config).await,
        Commands::Seed { file, embed } => cmd_seed(&config, file, embed).await,
        Commands::Backfill => cmd_backfill(&config).await,
        Commands::Ask {
            question,
            no_stream,
        } => cmd_ask(&config, question, !no_stream).await,
        Commands::Status => cmd_status(&config).await,
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn CorpusStore>> {
    let pool = init_pool(&config.database).await?;
    Ok(Arc::new(PgCorpusStore::new(pool, config.retrieval.dimensions)))
}

fn embedder(config: &Config) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(GeminiEmbeddingClient::new(
        &config.google,
        config.retrieval.dimensions,
    )?))
}

async fn cmd_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = init_pool_for_migrations(&config.database).await?;
    migrations::run(&pool, config.retrieval.dimensions).await?;
    println!(
        "{} Migrations complete (embedding dimensions: {})",
        style("✓").green(),
        config.retrieval.dimensions
    );
    Ok(())
}

async fn cmd_seed(config: &Config, file: PathBuf, embed: bool) -> anyhow::Result<()> {
    let reviews = ingest::load_reviews(&file)?;
    println!(
        "{} Loaded {} reviews from {}",
        style("○").dim(),
        reviews.len(),
        file.display()
    );

    let store = open_store(config).await?;
    let embedder = embedder(config)?;
    let report = ingest::seed(store.as_ref(), embedder.as_ref(), reviews, embed).await?;

    println!(
        "{} Inserted {} ({} embedded), skipped {}",
        style("✓").green(),
        style(report.inserted).cyan(),
        report.embedded,
        report.skipped
    );
    if report.inserted > report.embedded {
        println!(
            "   {} Run `profrag backfill` to embed the rest",
            style("ℹ").blue()
        );
    }
    Ok(())
}

async fn cmd_backfill(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let report = Backfiller::new(store, embedder(config)?, &config.backfill)
        .run()
        .await?;

    println!(
        "{} Backfill done: {} embedded, {} failed over {} pages",
        style("✓").green(),
        style(report.embedded).cyan(),
        report.failed,
        report.pages
    );
    if report.failed > 0 {
        println!(
            "   {} Failed reviews stay pending; run backfill again to retry",
            style("⚠").yellow()
        );
    }
    Ok(())
}

async fn cmd_ask(config: &Config, question: String, stream: bool) -> anyhow::Result<()> {
    config.require()?;

    let store = open_store(config).await?;
    let generator: Arc<dyn GenerationProvider> = Arc::new(
        GeminiClient::new(&config.google)?.with_options(GenerationOptions {
            temperature: config.generation.temperature,
            max_output_tokens: config.generation.max_output_tokens,
        }),
    );
    let chat = ChatService::from_config(config, store, embedder(config)?, generator)?;
    let conversation = Conversation::new(vec![Message::user(question)]);

    if stream {
        let mut fragments = chat.respond(&conversation).await?;
        let mut stdout = std::io::stdout();
        while let Some(fragment) = fragments.next().await {
            write!(stdout, "{}", fragment?)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        println!("{}", chat.answer(&conversation).await?);
    }
    Ok(())
}

async fn cmd_status(config: &Config) -> anyhow::Result<()> {
    println!("\n{}", style("profrag status").cyan().bold());

    let validation = validate_config(config);
    if validation.valid {
        println!("   {} Configuration valid", style("✓").green());
    }
    for error in &validation.errors {
        println!("   {} {}", style("✗").red(), error);
    }
    for warning in &validation.warnings {
        println!("   {} {}", style("⚠").yellow(), warning);
    }
    println!("      └─ Embedding model: {}", style(&config.google.embedding_model).cyan());
    println!("      └─ Generation model: {}", style(&config.google.generation_model).cyan());
    println!(
        "      └─ Retrieval: threshold {}, limit {}",
        config.retrieval.threshold, config.retrieval.limit
    );

    print!("   {} PostgreSQL... ", style("○").dim());
    std::io::stdout().flush()?;
    match open_store(config).await {
        Ok(store) => match store.stats().await {
            Ok(stats) => println!(
                "{} {} reviews, {} embedded, {} pending",
                style("✓").green(),
                stats.total,
                stats.embedded,
                stats.pending()
            ),
            Err(e) => println!("{} {}", style("✗").red(), e),
        },
        Err(e) => println!("{} {}", style("✗").red(), e),
    }

    println!();
    Ok(())
}
