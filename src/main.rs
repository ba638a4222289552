//! effcomm CLI - Search for the efficient frontier from a JSON run configuration.

use std::fs;
use std::path::PathBuf;

use effcomm::{
    Optimizer,
    schema::{DomainSpec, MeasureConfig, OptimizerConfig, RunConfig},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <run.json>", args[0]);
        eprintln!();
        eprintln!("Search for the complexity/informativity frontier of a domain.");
        eprintln!("The result is printed as JSON on stdout; set RUST_LOG=info for progress.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  run.json  Domain, optimizer and measure configuration");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let run: RunConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let mut optimizer = Optimizer::from_run_config(&run).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let result = optimizer
        .run_with_callback(|progress| {
            log::info!(
                "Generation {}/{}: {} valid, {} excluded, frontier {}",
                progress.generation + 1,
                progress.total_generations,
                progress.stats.evaluated,
                progress.stats.excluded(),
                progress.frontier.len()
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Optimization failed: {}", e);
            std::process::exit(1);
        });

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing result: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_example_config() {
    let run = RunConfig {
        domain: DomainSpec::example(),
        optimizer: OptimizerConfig {
            population_size: 40,
            generations: 50,
            convergence_patience: 10,
            random_seed: Some(0),
            ..Default::default()
        },
        measures: MeasureConfig::default(),
    };

    match serde_json::to_string_pretty(&run) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing example: {}", e);
            std::process::exit(1);
        }
    }
}
