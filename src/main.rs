use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kgrag::answer::AnswerGenerator;
use kgrag::config::FallbackStrategy;
use kgrag::db::Db;
use kgrag::embeddings::{Embedder, OpenAIEmbedder};
use kgrag::error::KgragError;
use kgrag::graph::{GraphStore, SqliteGraphStore};
use kgrag::llm::openai::OpenAiChatModel;
use kgrag::llm::LanguageModel;
use kgrag::{Config, HopLoop};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "kgrag", version)]
#[command(about = "Multi-hop question answering over a knowledge graph")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run migrations and check the graph schema (default)
    Verify,
    /// Tag retrievable nodes and build the full-text index
    Index,
    /// Answer a question
    Ask {
        question: String,

        /// Stop after retrieval; print the gathered context only
        #[arg(long)]
        no_answer: bool,

        /// Print the session outcome as JSON
        #[arg(long)]
        json: bool,

        /// Answer in this language, without the configured topic
        #[arg(long, value_name = "LANGUAGE")]
        answer_language: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.kgrag.log_level.as_str()),
    )
    .init();

    match cli.command.unwrap_or(Command::Verify) {
        Command::Verify => run_schema_verification(&config).await,
        Command::Index => run_index(&config).await,
        Command::Ask {
            question,
            no_answer,
            json,
            answer_language,
        } => run_ask(&config, &question, no_answer, json, answer_language.as_deref()).await,
    }
}

async fn open_store(config: &Config) -> Result<SqliteGraphStore> {
    log::info!("Database path: {}", config.db_path().display());
    let store = SqliteGraphStore::open(Db::new(config.db_path()))
        .await
        .context("Failed to open graph store")?;
    Ok(store)
}

/// Run migrations and verify that the graph tables exist
async fn run_schema_verification(config: &Config) -> Result<()> {
    log::info!("Starting kgrag v{}", env!("CARGO_PKG_VERSION"));
    let store = open_store(config).await?;

    store
        .db()
        .with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
            let tables: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

            let mut missing = Vec::new();
            for table in ["edges", "node_labels", "nodes", "schema_migrations"] {
                if tables.iter().any(|t| t == table) {
                    log::debug!("✓ Table exists: {}", table);
                } else {
                    log::error!("Missing table: {}", table);
                    missing.push(table);
                }
            }
            if !missing.is_empty() {
                return Err(KgragError::Config(format!("Missing tables: {}", missing.join(", "))));
            }
            if !tables.iter().any(|t| t == "entity_fts") {
                log::warn!("Full-text index not built yet; run `kgrag index`");
            }
            Ok(())
        })
        .await?;

    let (nodes, edges, marked) = store.counts().await?;
    log::info!("Schema verified: {} nodes, {} edges, {} marked entities", nodes, edges, marked);
    Ok(())
}

async fn run_index(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let start = Instant::now();
    store
        .ensure_entity_index(&config.retrieval.retrievable_labels)
        .await
        .context("Failed to build entity index")?;
    let (nodes, _, marked) = store.counts().await?;
    log::info!("Indexed {} of {} nodes in {:?}", marked, nodes, start.elapsed());
    Ok(())
}

async fn run_ask(
    config: &Config,
    question: &str,
    no_answer: bool,
    json: bool,
    answer_language: Option<&str>,
) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("Question cannot be empty");
    }

    let store: Arc<dyn GraphStore> = Arc::new(open_store(config).await?);
    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiChatModel::from_config(&config.llm)?);
    let embedder: Option<Arc<dyn Embedder>> = match config.retrieval.fallback {
        FallbackStrategy::Vector => Some(Arc::new(OpenAIEmbedder::from_config(&config.embeddings)?)),
        _ => None,
    };

    let hop_loop = HopLoop::from_config(config, Arc::clone(&model), store, embedder)?;
    let start = Instant::now();
    let outcome = hop_loop.run(question).await?;
    let retrieval_time = start.elapsed();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("\nQuestion: \"{}\"", question);
        println!(
            "Session {}: {} hop(s), {:?}, {:?}",
            outcome.session_id, outcome.hops, outcome.finish_reason, retrieval_time
        );
        for record in &outcome.trace {
            let op = record
                .decision
                .as_ref()
                .map(|d| format!("{:?}: {}", d.operation, d.reason))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  hop {}: {:?} +{} structured +{} fallback -> {}",
                record.hop, record.mentions, record.structured_entities, record.fallback_entities, op
            );
        }
        println!("\n{:-<80}", "");
        if outcome.context_text.is_empty() {
            println!("No context found.");
        } else {
            println!("{}", outcome.context_text.trim_start());
        }
        println!("{:-<80}", "");
    }

    if !no_answer {
        let generator = AnswerGenerator::new(model, &config.answer);
        let answer = match answer_language {
            Some(language) => {
                generator
                    .answer_in(&outcome.question, &outcome.context_text, language)
                    .await?
            }
            None => generator.answer_session(&outcome).await?,
        };
        println!("\n{}", answer);
    }
    Ok(())
}
