use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use loan_sim_core::amortization;
use loan_sim_core::catalogue::{ProductCatalogue, SimulationRequest};
use loan_sim_core::LoanProduct;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Engine failures carry their status class so the JS layer can map them onto responses.
fn to_status_error(e: loan_sim_core::LoanSimError) -> napi::Error {
    napi::Error::from_reason(format!("[{}] {}", e.status_code(), e))
}

fn parse_decimal(field: &str, value: &str) -> NapiResult<Decimal> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| to_napi_error(format!("{field}: {e}")))
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[napi]
pub fn effective_monthly_rate(annual_rate: String) -> NapiResult<String> {
    let annual = parse_decimal("annual_rate", &annual_rate)?;
    let monthly = amortization::effective_monthly_rate(annual).map_err(to_status_error)?;
    Ok(monthly.to_string())
}

#[napi]
pub fn installment_amount(principal: String, monthly_rate: String, term_months: u32) -> NapiResult<String> {
    let principal = parse_decimal("principal", &principal)?;
    let monthly_rate = parse_decimal("monthly_rate", &monthly_rate)?;
    let installment = amortization::installment_amount(principal, monthly_rate, term_months)
        .map_err(to_status_error)?;
    Ok(installment.to_string())
}

#[derive(Deserialize)]
struct ScheduleInput {
    principal: Decimal,
    installment: Decimal,
    monthly_rate: Decimal,
    term_months: u32,
}

#[napi]
pub fn build_schedule(input_json: String) -> NapiResult<String> {
    let input: ScheduleInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let schedule = amortization::build_schedule(
        input.principal,
        input.installment,
        input.monthly_rate,
        input.term_months,
    )
    .map_err(to_status_error)?;
    serde_json::to_string(&schedule).map_err(to_napi_error)
}

#[napi]
pub fn simulate_loan(input_json: String) -> NapiResult<String> {
    let input: amortization::SimulationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = amortization::simulate(&input).map_err(to_status_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

/// Simulate against a product looked up in a caller-supplied catalogue snapshot.
#[napi]
pub fn simulate_catalogue_product(catalogue_json: String, request_json: String) -> NapiResult<String> {
    let records: Vec<LoanProduct> = serde_json::from_str(&catalogue_json).map_err(to_napi_error)?;
    let catalogue = ProductCatalogue::from_products(records).map_err(to_status_error)?;
    let request: SimulationRequest = serde_json::from_str(&request_json).map_err(to_napi_error)?;
    let output = catalogue.simulate(&request).map_err(to_status_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn validate_product(request_json: String) -> NapiResult<String> {
    let request: loan_sim_core::catalogue::ProductRequest =
        serde_json::from_str(&request_json).map_err(to_napi_error)?;
    let product = request.validate().map_err(to_status_error)?;
    serde_json::to_string(&product).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[napi]
pub fn health_check() -> NapiResult<String> {
    serde_json::to_string(&loan_sim_core::health::check()).map_err(to_napi_error)
}
