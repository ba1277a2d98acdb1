//! Error types for the Meridian resolver

use thiserror::Error;

/// Main error type for the resolver
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Order {order_id} not found")]
    OrderNotFound { order_id: String },

    #[error("Order {order_id} already registered")]
    DuplicateOrder { order_id: String },

    #[error("Fill of {requested} exceeds order {order_id} total: {remaining} remaining")]
    FillExceedsTotal {
        order_id: String,
        requested: u128,
        remaining: u128,
    },

    #[error("Invalid secret: commitment check failed")]
    InvalidSecret,

    #[error("Secret already used for this order")]
    SecretAlreadyUsed,

    #[error("Malformed order payload: {0}")]
    InvalidOrder(String),

    #[error("Invalid swap transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Escrow creation failed on chain {chain_id}: {message}")]
    EscrowCreationFailed { chain_id: u64, message: String },

    #[error("Submission failed on chain {chain_id}: {message}")]
    SubmissionFailed { chain_id: u64, message: String },

    #[error("Timelock {timelock} not expired at chain time {now} for swap {swap_id}")]
    TimelockNotExpired {
        swap_id: String,
        timelock: u64,
        now: u64,
    },

    #[error("Swap {swap_id} failed: {reason}")]
    SwapFailed { swap_id: String, reason: String },

    #[error("Chain {chain_id} not found")]
    ChainNotFound { chain_id: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolverError {
    /// Check if error is retryable
    ///
    /// Validation errors are never retried: they indicate a caller error or
    /// an already-lost race. Chain submission errors are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolverError::EscrowCreationFailed { .. } | ResolverError::SubmissionFailed { .. }
        )
    }

    /// Check if error should trigger an operator alert
    pub fn should_alert(&self) -> bool {
        matches!(
            self,
            ResolverError::SwapFailed { .. } | ResolverError::InvalidTransition { .. }
        )
    }
}

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, ResolverError>;
