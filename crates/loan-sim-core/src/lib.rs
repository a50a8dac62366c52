pub mod amortization;
pub mod error;
pub mod types;

#[cfg(feature = "catalogue")]
pub mod catalogue;

#[cfg(feature = "health")]
pub mod health;

pub use error::LoanSimError;
pub use types::*;

/// Standard result type for all loan-sim operations
pub type LoanSimResult<T> = Result<T, LoanSimError>;
