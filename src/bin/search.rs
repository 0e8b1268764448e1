use clap::{Parser, ValueEnum};
use kgrag::db::Db;
use kgrag::embeddings::OpenAIEmbedder;
use kgrag::extraction::EntityMention;
use kgrag::graph::{GraphStore, ScoredNode, SqliteGraphStore};
use kgrag::search::{Bm25Retriever, StructuredRetriever, UnstructuredRetriever, VectorRetriever};
use kgrag::Config;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// Full-text lookup of entity mentions (`text^N` allowed)
    Structured,
    /// Lexical fallback over node descriptions
    Bm25,
    /// Embedding fallback
    Vector,
    /// Edges adjacent to the given node ids
    Neighbors,
}

#[derive(Parser, Debug)]
#[command(name = "search")]
#[command(about = "Run a single kgrag retriever against the graph")]
struct Args {
    #[arg(value_enum)]
    strategy: Strategy,

    /// Mentions for `structured`, node ids for `neighbors`, otherwise joined into one question
    #[arg(required = true)]
    terms: Vec<String>,

    /// Override the configured result count
    #[arg(short, long)]
    k: Option<usize>,
}

fn print_scored(nodes: &[ScoredNode]) {
    if nodes.is_empty() {
        println!("No results found.");
        return;
    }
    for (rank, node) in nodes.iter().enumerate() {
        println!("{:-<80}", "");
        println!("Rank #{}: {} (score: {:.3})", rank + 1, node.node_id, node.score);
        let preview: String = node.description.chars().take(200).collect();
        let ellipsis = if node.description.chars().count() > 200 { "..." } else { "" };
        println!("{}{}", preview, ellipsis);
    }
    println!("{:-<80}", "");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let language = config.language();
    let store = Arc::new(SqliteGraphStore::open(Db::new(config.db_path())).await?);
    let question = args.terms.join(" ");

    let start = Instant::now();
    match args.strategy {
        Strategy::Structured => {
            let mentions = EntityMention::parse_all(&args.terms);
            let k = args.k.unwrap_or(config.retrieval.structured_k);
            let retriever = StructuredRetriever::new(store, config.retrieval.retrievable_labels.clone(), k);
            let result = retriever.retrieve(&mentions, language).await?;
            if result.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", result.context_text.trim_start());
            }
        }
        Strategy::Bm25 => {
            let k = args.k.unwrap_or(config.retrieval.bm25_k);
            let retriever = Bm25Retriever::new(store, language, k);
            print_scored(&retriever.retrieve(&question).await?);
        }
        Strategy::Vector => {
            let embedder = Arc::new(OpenAIEmbedder::from_config(&config.embeddings)?);
            let r = &config.retrieval;
            let retriever = VectorRetriever::new(
                store,
                embedder,
                language,
                r.vector_label.clone(),
                r.vector_threshold,
                r.threshold_step,
                args.k.unwrap_or(r.vector_k),
            );
            print_scored(&retriever.retrieve(&question).await?);
        }
        Strategy::Neighbors => {
            for node_id in &args.terms {
                let edges = store.neighbor_edges(node_id).await?;
                println!("{} ({} edge(s))", node_id, edges.len());
                for edge in edges {
                    println!("  {}", edge);
                }
            }
        }
    }

    println!("\nStrategy: {:?}", args.strategy);
    println!("Latency: {:?}", start.elapsed());
    Ok(())
}
