//! Assembler Config CLI
//!
//! View and manage assembler settings.

use clap::{Parser, Subcommand};
use schema_assembler::config::{SchemaSettings, SourceSetting};
use schema_assembler::AssemblerSettings;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "assembler-config")]
#[command(about = "View and manage assembler settings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current settings
    Show {
        /// Settings file to load (optional)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new settings file
    Init {
        /// Output path
        #[arg(short, long, default_value = "assembler.toml")]
        output: PathBuf,
    },

    /// Validate settings and every schema config they point at
    Validate {
        /// Settings file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Show { config, toml, json } => {
            let settings = AssemblerSettings::load_from(config.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(&settings)?);
            } else {
                println!("📋 Assembler Settings\n");
                println!("Build:");
                println!("  Output: {:?}", settings.build.output_dir);
                println!("  Catalog: {:?}", settings.build.catalog);

                println!("\nSchemas:");
                for (key, schema) in &settings.schemas {
                    println!("  {}:", key);
                    match &schema.src {
                        Some(SourceSetting::Path(path)) => println!("    src: {}", path),
                        Some(SourceSetting::Named(named)) => {
                            for (name, value) in named {
                                println!("    src.{}: {:?}", name, value);
                            }
                        }
                        None => println!("    src: (none)"),
                    }
                    if let Some(config) = &schema.config {
                        println!("    config: {}", config.display());
                    }
                }
            }
        }

        Commands::Init { output } => {
            if output.exists() {
                return Err(format!("{} already exists", output.display()).into());
            }

            let mut settings = AssemblerSettings::default();
            settings.schemas.insert(
                "default".to_string(),
                SchemaSettings {
                    src: Some(SourceSetting::Path("./graphql".to_string())),
                    config: None,
                },
            );
            settings.save(&output)?;
            println!("✅ Created {}", output.display());
        }

        Commands::Validate { config } => {
            println!("🔍 Validating settings...");
            let settings = AssemblerSettings::load_from(config.as_deref())?;

            let mut errors = Vec::new();
            if let Some(catalog) = settings.catalog_path()? {
                check_path(&catalog, "catalog", &mut errors);
            }
            for key in settings.schema_keys() {
                match settings.loader(key).and_then(|loader| loader.load()) {
                    Ok(config) => println!(
                        "   ✅ {}: {} types, {} models, {} queries, {} mutations",
                        key,
                        config.types.len(),
                        config.models.len(),
                        config.queries.len(),
                        config.mutations.len()
                    ),
                    Err(e) => errors.push(format!("{}: {}", key, e)),
                }
            }

            if errors.is_empty() {
                println!("✅ Settings are valid");
            } else {
                println!("❌ Settings have errors:");
                for error in &errors {
                    println!("   - {}", error);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn check_path(path: &Path, name: &str, errors: &mut Vec<String>) {
    if !path.exists() {
        errors.push(format!("{} does not exist: {}", name, path.display()));
    }
}
