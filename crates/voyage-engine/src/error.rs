//! # Engine Error Types
//!
//! What callers of the engine see.
//!
//! ## Error Kinds
//! ```text
//! ┌──────────────┬──────────────────────────────────────┬─────────────────┐
//! │ ErrorKind    │ Raised by                            │ Written?        │
//! ├──────────────┼──────────────────────────────────────┼─────────────────┤
//! │ Validation   │ bad input, unknown reference         │ nothing         │
//! │ NotFound     │ booking / commission id unknown      │ nothing         │
//! │ State        │ tranche order, strict transition,    │ nothing         │
//! │              │ commission not APPROVED              │                 │
//! │ SideEffect   │ lead sync (rolls back), commission   │ rolled back /   │
//! │              │ reconciliation timeout               │ deferred        │
//! │ Storage      │ SQLite failure                       │ rolled back     │
//! │ Config       │ engine.toml / environment            │ n/a             │
//! └──────────────┴──────────────────────────────────────┴─────────────────┘
//! ```
//!
//! A failed post-commit commission call never surfaces as an `EngineError`
//! from `update_booking`; it is reported as `CommissionOutcome::Deferred`.

use std::fmt;

use thiserror::Error;
use voyage_core::{CoreError, ValidationError};
use voyage_db::DbError;

use crate::lead_sync::LeadSyncError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Coarse category of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    SideEffect,
    Storage,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::State => "state",
            ErrorKind::SideEffect => "side_effect",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
        };
        write!(f, "{}", s)
    }
}

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// The request failed input validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The entity the request targets does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A business rule refused the change.
    #[error("{0}")]
    State(CoreError),

    // =========================================================================
    // Side Effect Errors
    // =========================================================================
    /// Lead resynchronization failed; the booking update was rolled back.
    #[error("Lead sync failed: {0}")]
    LeadSync(#[from] LeadSyncError),

    /// A bounded side effect did not finish in time.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// Storage failure.
    #[error("Storage error: {0}")]
    Storage(DbError),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or parse the configuration file.
    #[error("Failed to load configuration: {0}")]
    ConfigLoadFailed(String),
}

impl EngineError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns the category callers branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::State(_) => ErrorKind::State,
            EngineError::LeadSync(_) | EngineError::Timeout { .. } => ErrorKind::SideEffect,
            EngineError::Storage(_) => ErrorKind::Storage,
            EngineError::InvalidConfig(_) | EngineError::ConfigLoadFailed(_) => ErrorKind::Config,
        }
    }

    /// True when the request was refused before anything was written.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::State
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => EngineError::Validation(v),
            other => EngineError::State(other),
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Storage(other),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::from(DbError::from(err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voyage_core::{CommissionStatus, TrancheSlot};

    #[test]
    fn test_core_errors_split_into_validation_and_state() {
        let validation: EngineError = CoreError::Validation(ValidationError::MustBePositive {
            field: "amount".into(),
        })
        .into();
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let state: EngineError = CoreError::TrancheAlreadyExists {
            slot: TrancheSlot::Second,
        }
        .into();
        assert_eq!(state.kind(), ErrorKind::State);
        assert!(state.is_rejection());
    }

    #[test]
    fn test_db_not_found_keeps_its_kind() {
        let err: EngineError = DbError::not_found("Booking", "b-1").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("b-1"));

        let err: EngineError = DbError::PoolExhausted.into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_side_effect_kinds() {
        let err = EngineError::Timeout {
            operation: "commission reconciliation".into(),
            timeout_ms: 250,
        };
        assert_eq!(err.kind(), ErrorKind::SideEffect);

        let err: EngineError = LeadSyncError::new("lead-1", "crm offline").into();
        assert_eq!(err.kind(), ErrorKind::SideEffect);
    }

    #[test]
    fn test_state_display_is_the_rule() {
        let err: EngineError = CoreError::InvalidCommissionState {
            commission_id: "c-1".into(),
            current: CommissionStatus::Pending,
        }
        .into();
        assert!(err.to_string().contains("c-1"));
        assert_eq!(ErrorKind::State.to_string(), "state");
    }
}
