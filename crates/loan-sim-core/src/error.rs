use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoanSimError {
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("Invalid term: {0}")]
    InvalidTerm(String),

    #[error("A loan product is required to run a simulation")]
    ProductRequired,

    #[error("Requested term of {requested} months exceeds the product limit of {max} months")]
    TermExceedsLimit { requested: i64, max: u32 },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Loan product not found with id {0}")]
    ProductNotFound(u64),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LoanSimError {
    /// HTTP-style status class a service layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            LoanSimError::ProductNotFound(_) => 404,
            LoanSimError::ConvergenceFailure { .. } | LoanSimError::SerializationError(_) => 500,
            _ => 400,
        }
    }
}

impl From<serde_json::Error> for LoanSimError {
    fn from(e: serde_json::Error) -> Self {
        LoanSimError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_client_errors() {
        assert_eq!(LoanSimError::ProductRequired.status_code(), 400);
        assert_eq!(
            LoanSimError::TermExceedsLimit { requested: 36, max: 24 }.status_code(),
            400
        );
        assert_eq!(LoanSimError::InvalidRate("negative".into()).status_code(), 400);
    }

    #[test]
    fn test_missing_product_is_not_found() {
        assert_eq!(LoanSimError::ProductNotFound(7).status_code(), 404);
    }

    #[test]
    fn test_term_limit_message() {
        let e = LoanSimError::TermExceedsLimit { requested: 36, max: 24 };
        assert_eq!(
            e.to_string(),
            "Requested term of 36 months exceeds the product limit of 24 months"
        );
    }
}
