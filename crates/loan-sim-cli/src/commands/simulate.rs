use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_sim_core::amortization::{self, SimulationInput};
use loan_sim_core::catalogue::SimulationRequest;
use loan_sim_core::LoanProduct;

use crate::commands::products::load_catalogue;
use crate::input;

/// Arguments for a loan simulation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SimulateArgs {
    /// Path to JSON input file with product, principal and term_months (overrides flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Simulate against this catalogue product
    #[arg(long)]
    pub product_id: Option<i64>,

    /// Catalogue file used with --product-id
    #[arg(long, env = "LOANSIM_CATALOGUE")]
    pub catalogue: Option<String>,

    /// Ad-hoc product: nominal annual rate in percent
    #[arg(long)]
    pub annual_rate: Option<Decimal>,

    /// Ad-hoc product: longest allowed term (defaults to the requested term)
    #[arg(long)]
    pub max_term_months: Option<u32>,

    /// Ad-hoc product: name
    #[arg(long, default_value = "Ad-hoc product")]
    pub name: String,

    /// Amount requested
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Requested term in months
    #[arg(long)]
    pub term_months: Option<i64>,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(id) = args.product_id {
        let path = args
            .catalogue
            .as_deref()
            .ok_or("--catalogue (or LOANSIM_CATALOGUE) is required with --product-id")?;
        let catalogue = load_catalogue(path)?;
        let request = SimulationRequest {
            product_id: id,
            principal: args
                .principal
                .ok_or("--principal is required with --product-id")?,
            term_months: args
                .term_months
                .ok_or("--term-months is required with --product-id")?,
        };
        let result = catalogue.simulate(&request)?;
        return Ok(serde_json::to_value(result)?);
    }

    let sim_input: SimulationInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(piped) = input::stdin::read_stdin::<SimulationInput>()? {
        piped
    } else {
        let product = args.annual_rate.map(|rate| {
            let max_term = args
                .max_term_months
                .or_else(|| args.term_months.and_then(|t| u32::try_from(t).ok()))
                .unwrap_or(amortization::MAX_TERM_MONTHS);
            LoanProduct::new(args.name.clone(), rate, max_term)
        });
        SimulationInput {
            product,
            principal: args.principal,
            term_months: args.term_months,
        }
    };

    let result = amortization::simulate(&sim_input)?;
    Ok(serde_json::to_value(result)?)
}
