//! Error types for panel operations.
//!
//! Two tiers: [`ConfigError`] covers everything that must be rejected at
//! configuration or resolution time, [`PanelError`] covers per-operation
//! outcomes. CapabilityDenied, NotFound, and Conflict are expected results
//! of normal operation and must never be logged as failures; backend and
//! configuration errors carry enough context (cache name, operation,
//! underlying message) for an operator to act.

use crate::ability::Operation;
use thiserror::Error;

/// Configuration-time errors. Fatal at resolution time: the panel must not
/// proceed with an ambiguous capability set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache '{name}' is not configured")]
    UnknownCache { name: String },

    #[error("adapter '{identifier}' is not registered")]
    UnknownAdapter { identifier: String },

    #[error(
        "override for cache '{cache}' forces '{operation}' on, \
         but the '{backend}' adapter cannot perform it"
    )]
    ImpossibleAbility {
        cache: String,
        backend: String,
        operation: Operation,
    },

    #[error("invalid page parameters: {reason}")]
    InvalidPage { reason: String },

    #[error("invalid configuration for cache '{cache}': {reason}")]
    InvalidInstance { cache: String, reason: String },

    #[error("failed to parse panel configuration: {reason}")]
    Parse { reason: String },
}

/// Per-operation errors surfaced to callers of the panel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PanelError {
    /// The operation is not in the effective ability set. Raised before any
    /// backend call.
    #[error("operation '{operation}' is not supported by cache '{cache}'")]
    CapabilityDenied { cache: String, operation: Operation },

    #[error("key '{key}' not found in cache '{cache}'")]
    NotFound { cache: String, key: String },

    /// `add` attempted on a key that already exists.
    #[error("key '{key}' already exists in cache '{cache}'")]
    Conflict { cache: String, key: String },

    /// The underlying client failed. Never retried by the panel.
    #[error("backend failure in cache '{cache}' during '{operation}': {message}")]
    Backend {
        cache: String,
        operation: Operation,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PanelError {
    /// Expected, user-facing outcomes of normal operation.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            PanelError::CapabilityDenied { .. }
                | PanelError::NotFound { .. }
                | PanelError::Conflict { .. }
        )
    }
}

/// Result type alias for panel operations.
pub type PanelResult<T> = Result<T, PanelError>;
