use clap::{Arg, ArgAction, Command};
use common::config::Settings;
use medallion::logging::init_logging;
use medallion::sample::write_sample_bronze;
use medallion::services::DEFAULT_SOURCE;
use medallion::storage;
use std::process;

const DEFAULT_CONFIG: &str = "config/medallion.toml";

fn cli() -> Command {
    Command::new("medallion-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bronze to silver to gold batch pipeline")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .default_value(DEFAULT_CONFIG)
                .help("Sets a custom config file"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("run-batch")
                .about("Run one bronze to silver to gold batch")
                .arg(
                    Arg::new("source")
                        .long("source")
                        .value_name("NAME")
                        .default_value(DEFAULT_SOURCE)
                        .help("Origin label recorded in batch metadata"),
                )
                .arg(
                    Arg::new("generate-sample")
                        .long("generate-sample")
                        .action(ArgAction::SetTrue)
                        .help("Seed the bronze layer with sample readings first"),
                ),
        )
        .subcommand(Command::new("health").about("Check that storage is reachable"))
        .subcommand(Command::new("serve").about("Start the read-only HTTP API"))
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_CONFIG);

    let settings = match Settings::new(config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            process::exit(1);
        }
    };
    init_logging(&settings);

    match matches.subcommand() {
        Some(("run-batch", run_matches)) => {
            let source = run_matches
                .get_one::<String>("source")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_SOURCE);

            if run_matches.get_flag("generate-sample") {
                match write_sample_bronze(&settings) {
                    Ok((path, rows)) => {
                        println!("Generated {} sample records at {}", rows, path.display())
                    }
                    Err(e) => {
                        eprintln!("Failed to generate sample data: {}", e);
                        process::exit(1);
                    }
                }
            }

            match medallion::run_batch(&settings, source).await {
                Ok(metrics) => {
                    if let Some(failure) = &metrics.failure {
                        eprintln!(
                            "Batch {} failed after {}: {}",
                            metrics.batch_id, failure.stage, failure.message
                        );
                    } else {
                        println!("Batch {} completed", metrics.batch_id);
                    }
                    println!("Records in:   {}", metrics.records_in);
                    println!("Records out:  {}", metrics.records_out);
                    println!("Duration:     {:.2}s", metrics.duration_seconds);
                    println!("Success rate: {:.1}%", metrics.success_rate());
                }
                Err(e) => {
                    eprintln!("Batch processing failed: {}", e);
                    process::exit(1);
                }
            }
        }
        Some(("health", _)) => {
            let healthy = match storage::from_settings(&settings).await {
                Ok(repository) => repository.health_check().await,
                Err(e) => {
                    eprintln!("Failed to open storage: {}", e);
                    false
                }
            };

            if healthy {
                println!("Storage: healthy");
            } else {
                println!("Storage: unhealthy");
                process::exit(1);
            }
        }
        Some(("serve", _)) => {
            if let Err(e) = medallion::serve(&settings).await {
                eprintln!("API server error: {}", e);
                process::exit(1);
            }
        }
        _ => {
            println!("No subcommand specified. Use --help for usage information.");
            process::exit(1);
        }
    }
}
