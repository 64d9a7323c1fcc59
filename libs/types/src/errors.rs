//! Error taxonomy for the exchange services
//!
//! All operations return discriminated results so callers can render inline
//! error states; no error here is meant to cross a boundary as a panic.

use crate::ids::UserId;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error returned by every exchange operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    /// Caller is neither requester nor provider (nor, for cancel, the
    /// listing owner). Non-retryable permission failure.
    #[error("user {user} is not a participant of this match")]
    NotParticipant { user: UserId },

    /// Operation attempted in a state that forbids it. Non-retryable;
    /// surfaced as a validation message.
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    /// A user tried to open a match against their own listing.
    #[error("cannot contact your own listing")]
    SelfMatch,

    /// Message content was empty after trimming.
    #[error("message content is empty")]
    EmptyContent,

    /// Message content exceeded the length limit. Rejected before any
    /// store round-trip.
    #[error("message is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    /// Send quota exhausted for the current window. Rejected before any
    /// store round-trip.
    #[error("rate limited, retry in {retry_after_nanos}ns")]
    RateLimited { retry_after_nanos: i64 },

    /// Referenced document does not exist (or is soft-deleted and hidden).
    #[error("{collection} document {id} not found")]
    NotFound { collection: String, id: Uuid },

    /// A read-modify-write lost the version race on every attempt.
    /// Callers own any further retry/backoff policy.
    #[error("update conflicted after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("listing error: {0}")]
    Listing(#[from] ListingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ExchangeError {
    /// Map a store lookup failure into the caller-facing taxonomy.
    ///
    /// Missing documents become `NotFound`; everything else is passed
    /// through as a store error.
    pub fn from_lookup(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => ExchangeError::NotFound { collection, id },
            other => ExchangeError::Store(other),
        }
    }
}

/// Listing validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListingError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("description must not be empty")]
    EmptyDescription,

    #[error("too many tags: {count}, limit is {max}")]
    TooManyTags { count: usize, max: usize },
}

/// Data-access layer errors
///
/// Defined here so service-level errors can wrap them without a dependency
/// cycle between the types and datastore crates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("document {id} not found in {collection}")]
    NotFound { collection: String, id: Uuid },

    #[error("document {id} already exists in {collection}")]
    AlreadyExists { collection: String, id: Uuid },

    #[error("version conflict: expected {expected}, actual {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("serialization failed: {0}")]
    Serde(String),
}
