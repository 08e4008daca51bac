mod commands;
mod config;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::classify::ClassifyArgs;
use commands::ecl::{EclArgs, KFactorsArgs};
use commands::penalty::PenaltyArgs;
use commands::provision::ProvisionArgs;
use commands::rating::RatingArgs;
use commands::recovery::RecoveryArgs;
use commands::stage::StageArgs;

/// PRINAD credit-risk engine
#[derive(Parser)]
#[command(
    name = "prinad",
    version,
    about = "PRINAD credit-risk scoring, forward-looking ECL, staging and recovery tracking",
    long_about = "A CLI for the PRINAD credit-risk engine with decimal precision. Computes \
                  behavioural penalties, PRINAD scores and ratings, scenario-weighted ECL \
                  and provisions, IFRS 9 stages with cure, and post-write-off recovery \
                  statistics. Inputs are JSON files or piped stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration (JSON, or YAML by extension)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Increase log verbosity on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Historical delinquency penalty, optionally applied to a PD base
    Penalty(PenaltyArgs),
    /// Map a score onto the rating scale
    Rating(RatingArgs),
    /// Classify contracts from precomputed PD bases
    Classify(ClassifyArgs),
    /// Scenario-weighted forward-looking multipliers
    KFactors(KFactorsArgs),
    /// Expected credit loss, with or without scenarios
    Ecl(EclArgs),
    /// Stage-aware portfolio provision
    Provision(ProvisionArgs),
    /// Evaluate stage transitions and cures
    Stage(StageArgs),
    /// Write-off recovery reports over a ledger file
    Recovery(RecoveryArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(2);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Penalty(args) => commands::penalty::run_penalty(args, &config),
        Commands::Rating(args) => commands::rating::run_rating(args, &config),
        Commands::Classify(args) => commands::classify::run_classify(args, &config),
        Commands::KFactors(args) => commands::ecl::run_k_factors(args, &config),
        Commands::Ecl(args) => commands::ecl::run_ecl(args, &config),
        Commands::Provision(args) => commands::provision::run_provision(args, &config),
        Commands::Stage(args) => commands::stage::run_stage(args, &config),
        Commands::Recovery(args) => commands::recovery::run_recovery(args, &config),
        Commands::Version => {
            println!("prinad {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
