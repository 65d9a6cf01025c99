//! Error types shared by the calculator, the stores and the loan book.
//!
//! Storage specific failures (SQLite today) are flattened into
//! [`Error::Storage`] so callers never depend on a particular backend.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Loan {0} not found")]
    LoanNotFound(i64),

    #[error("Payment {0} not found")]
    PaymentNotFound(i64),

    #[error("Storage operation failed: {0}")]
    Storage(String),
}

/// Rejected loan or payment input, reported before anything is persisted.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("'{field}' must be a positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("Failed to parse date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
