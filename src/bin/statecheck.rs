#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use statecheck::config::{AppConfig, BackendConfig, ConfigOverrides};
use statecheck::dataset::{PharmacyRecord, PharmacyTable};
use statecheck::pipeline::run_validation;
use statecheck::provider;

#[derive(Parser)]
#[command(
    name = "statecheck",
    version,
    about = "Validate mail-order pharmacy states-of-operation claims with an LLM oracle"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the input CSV batch by batch and write the enriched output
    Run {
        /// Oracle backend: openai or google (overrides AI_PROVIDER)
        #[arg(long)]
        provider: Option<String>,

        /// Input CSV path (overrides DATA_DIR/INPUT_FILENAME)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory (overrides OUTPUT_DIR)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Records per oracle call (overrides BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Seconds to pause between batches (overrides RATE_LIMIT_DELAY_SECONDS)
        #[arg(long)]
        delay_secs: Option<u64>,
    },
    /// Verify configuration, credentials, and the input file without any
    /// network activity
    Check {
        /// Input CSV path (overrides DATA_DIR/INPUT_FILENAME)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Send one synthetic pharmacy through the live provider and print the
    /// verdict, as a credential and parsing smoke test
    Probe {
        /// Oracle backend: openai or google (overrides AI_PROVIDER)
        #[arg(long)]
        provider: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            provider,
            input,
            output_dir,
            batch_size,
            delay_secs,
        } => {
            let overrides = ConfigOverrides {
                provider,
                input,
                output_dir,
                batch_size,
                delay_seconds: delay_secs,
            };
            let config = AppConfig::load(&overrides)?;
            let mut table = PharmacyTable::load(&config.input_path())?;
            let oracle = provider::from_config(&config)?;

            let summary = run_validation(oracle.as_ref(), &mut table, &config).await?;

            println!("\nValidation Summary:");
            println!("Total pharmacies: {}", summary.total);
            println!("Correct states of operation: {}", summary.correct);
            println!("Incorrect states of operation: {}", summary.incorrect);
            println!("Unresolved: {}", summary.unresolved);
            if summary.fallback_batches > 0 {
                println!(
                    "Batches that fell back to error verdicts: {}/{}",
                    summary.fallback_batches, summary.batches
                );
            }
            if summary.discarded_verdicts > 0 {
                println!(
                    "Verdicts discarded for bad indices: {}",
                    summary.discarded_verdicts
                );
            }
            println!("Success rate: {:.1}%", summary.resolved_rate() * 100.0);
            println!("Results saved to: {}", config.output_path().display());
        }
        Commands::Check { input } => {
            let overrides = ConfigOverrides {
                input,
                ..Default::default()
            };
            if !run_checks(&overrides) {
                return Err("setup verification failed".into());
            }
            println!("\nAll checks passed. Ready to run validation.");
        }
        Commands::Probe { provider: name } => {
            let overrides = ConfigOverrides {
                provider: name,
                ..Default::default()
            };
            let config = AppConfig::load(&overrides)?;
            let oracle = provider::from_config(&config)?;

            println!("Probing {} with one synthetic pharmacy...", oracle.label());
            let outcome = oracle.validate_batch(&[sample_record()]).await;

            for verdict in outcome.verdicts() {
                println!(
                    "index={} is_correct={} confidence={} corrected={:?}",
                    verdict.record_index,
                    verdict
                        .is_correct
                        .map(|b| b.to_string())
                        .unwrap_or_else(|| "null".to_string()),
                    verdict.confidence.as_str(),
                    verdict.corrected_states,
                );
                println!("reasoning: {}", verdict.reasoning);
            }
            if let Some(reason) = outcome.fallback_reason() {
                return Err(format!("probe failed: {reason}").into());
            }
            println!("Probe succeeded.");
        }
    }

    Ok(())
}

/// Offline setup verification: config, credential presence, input schema.
fn run_checks(overrides: &ConfigOverrides) -> bool {
    let mut ok = true;

    let config = match AppConfig::load(overrides) {
        Ok(config) => {
            println!("ok   configuration loaded ({})", config.backend.label());
            config
        }
        Err(e) => {
            println!("FAIL configuration: {e}");
            return false;
        }
    };

    let api_key = match &config.backend {
        BackendConfig::OpenAi(c) => &c.api_key,
        BackendConfig::Google(c) => &c.api_key,
    };
    if api_key.len() < 20 {
        println!("FAIL API key looks too short ({} chars)", api_key.len());
        ok = false;
    } else {
        println!("ok   API key present");
    }

    let input_path = config.input_path();
    match PharmacyTable::load(&input_path) {
        Ok(table) => {
            println!(
                "ok   input file loaded: {} ({} rows)",
                input_path.display(),
                table.len()
            );
        }
        Err(e) => {
            println!("FAIL input file: {e}");
            ok = false;
        }
    }

    ok
}

fn sample_record() -> PharmacyRecord {
    PharmacyRecord {
        store_name: Some("Test Pharmacy".to_string()),
        address1: Some("123 Main St".to_string()),
        city: Some("Anytown".to_string()),
        state: Some("CA".to_string()),
        zip_code: Some("90210".to_string()),
        operates_in_states: Some("CA, NV, AZ".to_string()),
        ncpdp_id: Some("1234567".to_string()),
    }
}
