use serde_json::Value;

use loan_sim_core::health;

pub fn run_health() -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::to_value(health::check())?)
}
