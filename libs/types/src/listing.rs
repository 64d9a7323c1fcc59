//! Service listing types
//!
//! A listing is either an offering ("I will tutor calculus") or a request
//! ("I need a ride to the airport"). Listings are owned by exactly one user
//! and soft-deleted: `Deleted` hides a listing from reads but never erases it.

use crate::errors::ListingError;
use crate::ids::{ListingId, UserId};
use serde::{Deserialize, Serialize};

/// Maximum number of tags per listing
pub const MAX_TAGS: usize = 5;

/// Whether the listing offers a service or asks for one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Offering,
    Request,
}

/// Listing lifecycle status
///
/// `Matched` and `Completed` are driven by the match engine; `Deleted` is a
/// terminal soft-delete set by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Matched,
    Completed,
    Deleted,
}

impl ListingStatus {
    /// Check if the status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListingStatus::Deleted)
    }

    /// Status label for error messages and logging
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Matched => "matched",
            ListingStatus::Completed => "completed",
            ListingStatus::Deleted => "deleted",
        }
    }
}

/// A service listing posted by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub listing_id: ListingId,
    pub kind: ListingKind,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub owner: UserId,
    pub status: ListingStatus,
    /// Unix nanoseconds
    pub created_at: i64,
    /// Unix nanoseconds
    pub updated_at: i64,
}

impl Listing {
    /// Create a new active listing, validating title, description and tags.
    pub fn new(
        owner: UserId,
        kind: ListingKind,
        title: &str,
        description: &str,
        category: &str,
        tags: Vec<String>,
        timestamp: i64,
    ) -> Result<Self, ListingError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ListingError::EmptyTitle);
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(ListingError::EmptyDescription);
        }
        let tags = normalize_tags(tags)?;

        Ok(Self {
            listing_id: ListingId::new(),
            kind,
            title: title.to_string(),
            description: description.to_string(),
            category: category.trim().to_string(),
            tags,
            owner,
            status: ListingStatus::Active,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }
}

/// Trim, drop empties, dedupe (first occurrence wins), and cap tag count.
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, ListingError> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    if out.len() > MAX_TAGS {
        return Err(ListingError::TooManyTags {
            count: out.len(),
            max: MAX_TAGS,
        });
    }
    Ok(out)
}
