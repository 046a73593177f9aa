//! # Contract Error Taxonomy
//!
//! Four failure kinds cover every precondition in the onboarding contracts.
//! Each rejection aborts the whole operation with no partial writes, and
//! each carries enough context for the caller to diagnose which check
//! failed — a missing user is distinguishable from a missing ork
//! assignment, an unauthorized reassignment from an unauthorized fragment
//! post.

use thiserror::Error;

use crate::auth::{AccountId, Username};

/// The record class an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// An oracle-node assignment record.
    Ork,
    /// A user lifecycle record.
    User,
    /// An encrypted key-fragment record.
    Fragment,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Ork => write!(f, "ork"),
            RecordKind::User => write!(f, "user"),
            RecordKind::Fragment => write!(f, "fragment"),
        }
    }
}

/// Errors surfaced by the onboarding contracts.
#[derive(Debug, Error)]
pub enum OnboardError {
    /// The caller does not hold the ownership a mutation requires.
    #[error("unauthorized: {account} does not control the {kind} record for username {username}")]
    Unauthorized {
        /// The account that attempted the operation.
        account: AccountId,
        /// The record class the caller tried to mutate.
        kind: RecordKind,
        /// The username keying the record.
        username: Username,
    },

    /// A record the operation depends on does not exist.
    #[error("{kind} record not found for username {username}")]
    NotFound {
        /// The record class that was looked up.
        kind: RecordKind,
        /// The username keying the missing record.
        username: Username,
    },

    /// An input value is malformed for the requested operation.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input.
        reason: String,
    },

    /// The record exists but is in a state that forbids the operation.
    #[error("invalid state: {reason}")]
    InvalidState {
        /// Why the current state rejects the transition.
        reason: String,
    },
}

impl OnboardError {
    /// Stable machine-readable kind label, used for metrics and HTTP
    /// status mapping.
    pub fn kind_label(&self) -> &'static str {
        match self {
            OnboardError::Unauthorized { .. } => "unauthorized",
            OnboardError::NotFound { .. } => "not_found",
            OnboardError::InvalidArgument { .. } => "invalid_argument",
            OnboardError::InvalidState { .. } => "invalid_state",
        }
    }
}
