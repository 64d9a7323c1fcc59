//! Listing directory operations

use std::sync::Arc;

use datastore::collections::LISTINGS;
use datastore::document::{encode, DocumentStore};
use types::errors::{ExchangeError, StoreError};
use types::ids::{ListingId, UserId};
use types::listing::{normalize_tags, Listing, ListingKind, ListingStatus};

const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Browse filter; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub kind: Option<ListingKind>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub owner: Option<UserId>,
    /// Also return completed listings, not just active ones.
    pub include_completed: bool,
}

impl ListingFilter {
    fn matches(&self, listing: &Listing) -> bool {
        if let Some(kind) = self.kind {
            if listing.kind != kind {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !listing.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !listing.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        if let Some(owner) = self.owner {
            if listing.owner != owner {
                return false;
            }
        }
        match listing.status {
            ListingStatus::Active => true,
            ListingStatus::Completed => self.include_completed,
            ListingStatus::Matched | ListingStatus::Deleted => false,
        }
    }
}

/// Partial edit of an active listing; unset fields stay as they are.
#[derive(Debug, Clone, Default)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// CRUD over the listings collection
pub struct ListingDirectory<S> {
    store: Arc<S>,
    retry_budget: u32,
}

impl<S: DocumentStore> ListingDirectory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    /// Post a new listing.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        owner: UserId,
        kind: ListingKind,
        title: &str,
        description: &str,
        category: &str,
        tags: Vec<String>,
        now: i64,
    ) -> Result<Listing, ExchangeError> {
        let listing = Listing::new(owner, kind, title, description, category, tags, now)?;
        self.store
            .insert(
                LISTINGS,
                *listing.listing_id.as_uuid(),
                encode(&listing)?,
                now,
            )
            .await?;
        tracing::info!(listing_id = %listing.listing_id, kind = ?kind, "listing created");
        Ok(listing)
    }

    /// Fetch one listing. Soft-deleted listings are hidden and report
    /// `NotFound` like a missing document.
    pub async fn get(&self, listing_id: ListingId) -> Result<Listing, ExchangeError> {
        let doc = self
            .store
            .get(LISTINGS, *listing_id.as_uuid())
            .await
            .map_err(ExchangeError::from_lookup)?;
        let listing: Listing = doc.decode()?;
        if listing.status == ListingStatus::Deleted {
            return Err(ExchangeError::NotFound {
                collection: LISTINGS.to_string(),
                id: *listing_id.as_uuid(),
            });
        }
        Ok(listing)
    }

    /// Browse listings matching the filter, newest first.
    ///
    /// Deleted listings never appear; matched listings are hidden while
    /// their exchange is in flight.
    pub async fn browse(&self, filter: &ListingFilter) -> Result<Vec<Listing>, ExchangeError> {
        // Cheap raw-value prefilter before decoding full documents.
        let docs = self
            .store
            .query(LISTINGS, &|doc| {
                doc.value.get("status").and_then(|s| s.as_str()) != Some("deleted")
            })
            .await?;

        let mut listings = Vec::with_capacity(docs.len());
        for doc in docs {
            let listing: Listing = doc.decode()?;
            if filter.matches(&listing) {
                listings.push(listing);
            }
        }
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listings)
    }

    /// Edit an active listing. Owner-only.
    pub async fn update(
        &self,
        listing_id: ListingId,
        caller: UserId,
        patch: ListingPatch,
        now: i64,
    ) -> Result<Listing, ExchangeError> {
        self.modify(listing_id, now, |listing| {
            if listing.owner != caller {
                return Err(ExchangeError::NotParticipant { user: caller });
            }
            if listing.status != ListingStatus::Active {
                return Err(ExchangeError::InvalidState {
                    action: "edit",
                    state: listing.status.as_str(),
                });
            }
            if let Some(title) = &patch.title {
                let title = title.trim();
                if title.is_empty() {
                    return Err(types::errors::ListingError::EmptyTitle.into());
                }
                listing.title = title.to_string();
            }
            if let Some(description) = &patch.description {
                let description = description.trim();
                if description.is_empty() {
                    return Err(types::errors::ListingError::EmptyDescription.into());
                }
                listing.description = description.to_string();
            }
            if let Some(category) = &patch.category {
                listing.category = category.trim().to_string();
            }
            if let Some(tags) = &patch.tags {
                listing.tags = normalize_tags(tags.clone())?;
            }
            Ok(())
        })
        .await
    }

    /// Soft-delete a listing. Owner-only; a listing with a match in flight
    /// must be cancelled or completed first.
    pub async fn remove(
        &self,
        listing_id: ListingId,
        caller: UserId,
        now: i64,
    ) -> Result<(), ExchangeError> {
        self.modify(listing_id, now, |listing| {
            if listing.owner != caller {
                return Err(ExchangeError::NotParticipant { user: caller });
            }
            if listing.status == ListingStatus::Matched {
                return Err(ExchangeError::InvalidState {
                    action: "delete",
                    state: listing.status.as_str(),
                });
            }
            listing.status = ListingStatus::Deleted;
            Ok(())
        })
        .await?;
        tracing::info!(listing_id = %listing_id, "listing deleted");
        Ok(())
    }

    /// Read-modify-CAS cycle shared by the mutating operations. Hides
    /// soft-deleted listings the same way `get` does.
    async fn modify<F>(
        &self,
        listing_id: ListingId,
        now: i64,
        mut apply: F,
    ) -> Result<Listing, ExchangeError>
    where
        F: FnMut(&mut Listing) -> Result<(), ExchangeError>,
    {
        for _ in 0..self.retry_budget {
            let doc = self
                .store
                .get(LISTINGS, *listing_id.as_uuid())
                .await
                .map_err(ExchangeError::from_lookup)?;
            let mut listing: Listing = doc.decode()?;
            if listing.status == ListingStatus::Deleted {
                return Err(ExchangeError::NotFound {
                    collection: LISTINGS.to_string(),
                    id: *listing_id.as_uuid(),
                });
            }
            apply(&mut listing)?;
            listing.updated_at = now;
            match self
                .store
                .compare_and_swap(
                    LISTINGS,
                    *listing_id.as_uuid(),
                    doc.version,
                    encode(&listing)?,
                    now,
                )
                .await
            {
                Ok(_) => return Ok(listing),
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ExchangeError::Conflict {
            attempts: self.retry_budget,
        })
    }
}
