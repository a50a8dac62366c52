mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::engine::{InstallmentArgs, MonthlyRateArgs, ScheduleArgs};
use commands::products::ProductsCommand;
use commands::simulate::SimulateArgs;

/// Loan product catalogue and amortization simulations
#[derive(Parser)]
#[command(
    name = "loansim",
    version,
    about = "Loan product catalogue and amortization simulations",
    long_about = "A CLI for simulating fixed-installment (Price) loans with decimal precision. \
                  Converts annual rates to effective monthly rates, computes installments, \
                  builds month-by-month schedules and manages a JSON product catalogue. \
                  Set RUST_LOG=debug to trace each simulation stage on stderr."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a nominal annual rate into the effective monthly rate
    MonthlyRate(MonthlyRateArgs),
    /// Calculate the fixed monthly installment
    Installment(InstallmentArgs),
    /// Build the month-by-month amortization schedule
    Schedule(ScheduleArgs),
    /// Simulate a loan against a catalogue or ad-hoc product
    Simulate(SimulateArgs),
    /// Manage the loan product catalogue
    #[command(subcommand)]
    Products(ProductsCommand),
    /// Report engine health
    Health,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
    Yaml,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::MonthlyRate(args) => commands::engine::run_monthly_rate(args),
        Commands::Installment(args) => commands::engine::run_installment(args),
        Commands::Schedule(args) => commands::engine::run_schedule(args),
        Commands::Simulate(args) => commands::simulate::run_simulate(args),
        Commands::Products(command) => commands::products::run_products(command),
        Commands::Health => commands::health::run_health(),
        Commands::Version => {
            println!("loansim {}", env!("CARGO_PKG_VERSION"));
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
