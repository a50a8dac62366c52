use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Instant;

use loan_sim_core::amortization;
use loan_sim_core::with_metadata;

/// Arguments for the annual-to-monthly rate conversion
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct MonthlyRateArgs {
    /// Nominal annual rate in percent (12.00 = 12%)
    #[arg(long)]
    pub annual_rate: Decimal,
}

/// Arguments for the fixed installment calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct InstallmentArgs {
    /// Amount borrowed
    #[arg(long)]
    pub principal: Decimal,

    /// Effective monthly rate in percent
    #[arg(long)]
    pub monthly_rate: Decimal,

    /// Number of monthly installments
    #[arg(long)]
    pub term_months: u32,
}

/// Arguments for the month-by-month schedule
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ScheduleArgs {
    /// Amount borrowed
    #[arg(long)]
    pub principal: Decimal,

    /// Fixed installment; computed from the rate and term when omitted
    #[arg(long)]
    pub installment: Option<Decimal>,

    /// Effective monthly rate in percent
    #[arg(long)]
    pub monthly_rate: Decimal,

    /// Number of monthly installments
    #[arg(long)]
    pub term_months: u32,
}

pub fn run_monthly_rate(args: MonthlyRateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let monthly = amortization::effective_monthly_rate(args.annual_rate)?;
    let output = with_metadata(
        "Effective monthly rate: (1 + annual)^(1/12) - 1",
        &json!({ "annual_rate": args.annual_rate.to_string() }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        json!({
            "annual_rate": args.annual_rate,
            "effective_monthly_rate": monthly,
        }),
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_installment(args: InstallmentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let installment =
        amortization::installment_amount(args.principal, args.monthly_rate, args.term_months)?;
    let total_paid = installment
        .checked_mul(Decimal::from(args.term_months))
        .ok_or("principal is too large to amortize")?;
    let output = with_metadata(
        "Fixed installment (Price method)",
        &json!({
            "principal": args.principal.to_string(),
            "monthly_rate": args.monthly_rate.to_string(),
            "term_months": args.term_months,
        }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        json!({
            "installment": installment,
            "total_paid": total_paid,
        }),
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let installment = match args.installment {
        Some(value) => value,
        None => {
            warnings.push("No --installment given; using the Price-method installment".to_string());
            amortization::installment_amount(args.principal, args.monthly_rate, args.term_months)?
        }
    };
    let schedule = amortization::build_schedule(
        args.principal,
        installment,
        args.monthly_rate,
        args.term_months,
    )?;

    let output = with_metadata(
        "Fixed-installment schedule, interest rounded monthly",
        &json!({
            "principal": args.principal.to_string(),
            "installment": installment.to_string(),
            "monthly_rate": args.monthly_rate.to_string(),
            "term_months": args.term_months,
        }),
        warnings,
        start.elapsed().as_micros() as u64,
        json!({
            "installment": installment,
            "schedule": schedule,
        }),
    );
    Ok(serde_json::to_value(output)?)
}
