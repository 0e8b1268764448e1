use anyhow::{Context, Result};
use clap::Parser;
use kgrag::db::Db;
use kgrag::graph::{GraphStore, SqliteGraphStore};
use kgrag::llm::openai::OpenAiChatModel;
use kgrag::resolution::{find_candidate_clusters, CandidateSettings, EntityResolver};
use kgrag::Config;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "resolve")]
#[command(about = "Find duplicate entities and decide which to merge")]
struct Args {
    /// Directory for `<topic>_merged_entities.json`
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// File name prefix; defaults to `[answer] topic`
    #[arg(short, long)]
    topic: Option<String>,

    /// Print candidate clusters without asking the model
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let store = SqliteGraphStore::open(Db::new(config.db_path())).await?;
    let settings = CandidateSettings::from(&config.resolution);

    if args.dry_run {
        let nodes = store.entity_embeddings(config.language()).await?;
        let clusters = find_candidate_clusters(&nodes, &settings);
        println!("{} candidate cluster(s) among {} entities", clusters.len(), nodes.len());
        for cluster in clusters {
            println!("  {:?}", cluster);
        }
        return Ok(());
    }

    let model = Arc::new(OpenAiChatModel::from_config(&config.llm)?);
    let resolver = EntityResolver::new(model);
    let report = resolver.resolve_store(&store, config.language(), &settings).await?;

    let topic = args.topic.unwrap_or_else(|| config.answer.topic.clone());
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let output_path = args.output_dir.join(format!("{}_merged_entities.json", topic));
    std::fs::write(&output_path, serde_json::to_string_pretty(&report.merge_entities)?)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!(
        "{} candidate cluster(s), {} merge group(s)",
        report.candidate_clusters.len(),
        report.merge_entities.len()
    );
    println!("Merged entities saved to: {}", output_path.display());
    Ok(())
}
