//! Schema Build CLI
//!
//! Builds and persists every configured schema, or one with `--schema`.

use anyhow::{bail, Context};
use clap::Parser;
use schema_assembler::{
    AssemblerSettings, BuildSummary, FileSchemaStorage, PluginRegistry, SchemaStorage,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "build-schema")]
#[command(about = "Assemble, validate and persist GraphQL schemas")]
struct Cli {
    /// Only build this schema key
    #[arg(short, long)]
    schema: Option<String>,

    /// Clear stored schemas before building
    #[arg(long)]
    clear: bool,

    /// Settings file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a JSON summary per schema
    #[arg(long)]
    json: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = AssemblerSettings::load_from(cli.config.as_deref())
        .context("Failed to load assembler settings")?;

    let catalog = settings
        .catalog()
        .context("Failed to load model catalog")?;
    let registry = PluginRegistry::builtin();

    let output_dir = match cli.output.clone() {
        Some(output) => output,
        None => settings.output_dir()?,
    };
    let mut storage = FileSchemaStorage::new(&output_dir);

    let keys: Vec<String> = match &cli.schema {
        Some(key) => {
            if !settings.schemas.contains_key(key) {
                bail!("Schema {} is not configured", key);
            }
            vec![key.clone()]
        }
        None => settings.schema_keys().map(str::to_string).collect(),
    };
    if keys.is_empty() {
        bail!("No schemas configured. Add a [schemas.<key>] section to assembler.toml");
    }

    for key in &keys {
        let start = Instant::now();
        println!("🔨 Building schema {}...", key);

        if cli.clear {
            storage.clear(key)?;
            println!("   🧹 Cleared stored schema");
        }

        let assembled = settings
            .build_schema(key, &catalog, &registry)
            .with_context(|| format!("Failed to build schema {}", key))?;
        storage.persist_schema(&assembled)?;

        let elapsed = start.elapsed();
        info!(schema = %key, elapsed_ms = elapsed.as_millis() as u64, "Built schema");

        let summary = BuildSummary::from(&assembled);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!(
                "   ✅ {} types, {} models, {} queries, {} mutations",
                summary.types, summary.models, summary.queries, summary.mutations
            );
            println!("   🔑 {}", summary.fingerprint);
            println!("   ⏱  {:.2?} → {}", elapsed, storage.schema_dir(key)?.display());
        }
    }

    Ok(())
}
