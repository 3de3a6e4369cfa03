//! Centralized error taxonomy for the bridge.
//!
//! Grounded on `Shyamuday-rustro/src/error.rs`: a closed `thiserror` enum
//! with classifier methods, one family of variants per bucket in spec.md
//! §7. Parse-level rejection (missing action/price/symbol) is not an error
//! at all — those paths return `None`/are filtered before this type is ever
//! constructed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    // Gate rejection (spec.md §7 bucket 2) — logged at debug, discarded.
    #[error("channel not permitted: {0}")]
    ChannelNotAllowed(String),

    #[error("symbol not permitted: {0}")]
    SymbolNotAllowed(String),

    #[error("outside configured time window")]
    OutsideTimeWindow,

    // Transient broker/network (bucket 3) — back off and retry.
    #[error("broker connection lost: {0}")]
    BrokerConnectionLost(String),

    #[error("broker rate limited: {0}")]
    BrokerRateLimited(String),

    #[error("broker terminal not initialized")]
    BrokerNotInitialized,

    // Recoverable broker-logic (bucket 4).
    #[error("invalid price rejected by broker: {0}")]
    InvalidPrice(String),

    #[error("duplicate position, order skipped")]
    DuplicatePosition,

    // Fatal broker (bucket 5) — log critical, abandon the operation.
    #[error("algorithmic trading disabled on terminal")]
    AlgoTradingDisabled,

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("broker authentication failed: {0}")]
    AuthenticationFailed(String),

    // Data-integrity (bucket 6) — log debug, do not apply the update.
    #[error("stop-loss digit length mismatch: stored {stored} vs candidate {candidate}")]
    StopLossLengthMismatch { stored: String, candidate: String },

    #[error("no signal found for referenced message")]
    SignalNotFound,

    // Internal invariant violation (bucket 7) — log error, skip.
    #[error("position {ticket} has no owning signal")]
    OrphanPosition { ticket: i64 },

    #[error("persistence error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Transient errors back off five seconds and retry the enclosing loop
    /// without dropping state (spec.md §7 bucket 3).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::BrokerConnectionLost(_)
                | BridgeError::BrokerRateLimited(_)
                | BridgeError::BrokerNotInitialized
        )
    }

    /// Fatal errors are logged at critical and abandon the operation, but
    /// never crash the owning loop (spec.md §7 bucket 5).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::AlgoTradingDisabled
                | BridgeError::UnknownSymbol(_)
                | BridgeError::AuthenticationFailed(_)
        )
    }

    /// Data-integrity and internal-invariant errors are logged and the
    /// update is silently skipped (spec.md §7 buckets 6-7).
    pub fn is_silent_skip(&self) -> bool {
        matches!(
            self,
            BridgeError::StopLossLengthMismatch { .. }
                | BridgeError::SignalNotFound
                | BridgeError::OrphanPosition { .. }
        )
    }
}
