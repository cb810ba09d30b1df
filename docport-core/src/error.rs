//! Error and result types shared by every document store driver.
//!
//! Drivers report failures through [`StoreError`], and the portable layer
//! classifies them with [`ErrorCode`], a closed, driver-independent set of
//! codes that callers can match on without knowing which backend produced
//! the error. Use [`StoreResult<T>`] as the return type for fallible
//! operations.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors produced by a document collection driver.
///
/// Each variant corresponds to exactly one [`ErrorCode`], so classification
/// never loses information. The payload is a human-readable description of
/// what went wrong.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The key was absent for an operation that requires an existing document
    /// (Get, Replace, Update).
    #[error("not found: {0}")]
    NotFound(String),
    /// A Create was attempted against a key that already holds a document.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// The caller supplied something the driver cannot act on: a wrongly
    /// typed revision, a field path through a non-map value, an unsupported
    /// increment operand, a missing key strategy, or a malformed URL.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An optimistic-concurrency revision check failed: the caller's revision
    /// does not match the stored one.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    /// A branch that should be unreachable when callers hold up their side of
    /// the contract, such as an increment amount the portable layer should
    /// have validated.
    #[error("internal: {0}")]
    Internal(String),
    /// The operation was canceled before the action ran.
    #[error("operation canceled")]
    Canceled,
}

/// A closed classification of driver errors.
///
/// `Ok` is included so the code can also describe the absence of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    NotFound,
    AlreadyExists,
    InvalidArgument,
    FailedPrecondition,
    Internal,
    Canceled,
}

impl StoreError {
    /// Returns the [`ErrorCode`] this error classifies as.
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound(_) => ErrorCode::NotFound,
            StoreError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            StoreError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            StoreError::FailedPrecondition(_) => ErrorCode::FailedPrecondition,
            StoreError::Internal(_) => ErrorCode::Internal,
            StoreError::Canceled => ErrorCode::Canceled,
        }
    }
}

/// A specialized `Result` type for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::InvalidArgument(err.to_string())
    }
}
