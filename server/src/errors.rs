//! Error kinds surfaced by the coordination service.
//!
//! Every fallible entry point returns one of these kinds; the wire layer
//! maps them onto its own status codes.

use crate::models::constraint::Constraint;
use crate::models::operational_intent::OperationalIntent;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Message attached to the [`Error::MissingOvns`] kind
pub const MISSING_OVNS_MESSAGE: &str =
    "Current OVNs not provided for one or more OperationalIntents or Constraints";

/// Error kinds for coordination operations
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed input or a failed invariant
    BadRequest(String),

    /// Entity does not exist
    NotFound(String),

    /// Missing manager context, missing scope, or a record owned by another manager
    PermissionDenied(String),

    /// Supplied OVN or version does not match the stored one
    VersionMismatch(String),

    /// Create attempted against an existing id
    AlreadyExists(String),

    /// The strategic-deconfliction key did not cover every conflicting record.
    /// OVNs of records not owned by the caller are redacted.
    MissingOvns {
        /// Conflicting operational intents absent from the supplied key
        operational_intents: Vec<OperationalIntent>,
        /// Conflicting constraints absent from the supplied key
        constraints: Vec<Constraint>,
    },

    /// Store or other collaborator failure
    Internal(String),

    /// Transient serialization conflict; retried by the transactional store
    /// and never surfaced to callers.
    RetryableConflict,
}

impl Error {
    /// True for conflicts the transactional store should re-run the action for
    pub fn retryable(&self) -> bool {
        matches!(self, Error::RetryableConflict)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Error::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            Error::VersionMismatch(msg) => write!(f, "Version mismatch: {}", msg),
            Error::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            Error::MissingOvns { .. } => write!(f, "{}", MISSING_OVNS_MESSAGE),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
            Error::RetryableConflict => write!(f, "Retryable transaction conflict"),
        }
    }
}

impl std::error::Error for Error {}
