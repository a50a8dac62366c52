use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
    pub version: String,
    pub checked_at: DateTime<Utc>,
}

/// Liveness report. The engine holds no state, so it is always up.
pub fn check() -> HealthStatus {
    HealthStatus {
        status: "UP".into(),
        message: "Loan simulation engine is operational".into(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checked_at: Utc::now(),
    }
}
