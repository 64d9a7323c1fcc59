//! Match lifecycle state machine
//!
//! Every operation is a single read-modify-CAS cycle against the match
//! document, re-reading authoritative state on each attempt so concurrent
//! writers from both participants cannot lose updates. The retry budget is
//! small and fixed; exhausting it surfaces `Conflict` and leaves any further
//! backoff policy to the caller.

use std::sync::Arc;

use datastore::collections::{LISTINGS, MATCHES};
use datastore::document::{encode, DocumentStore};
use types::errors::{ExchangeError, StoreError};
use types::ids::{ListingId, MatchId, UserId};
use types::listing::{Listing, ListingKind, ListingStatus};
use types::matching::{Match, MatchStatus};

/// CAS attempts per operation before giving up with `Conflict`
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Authoritative match state machine over a document store
pub struct MatchEngine<S> {
    store: Arc<S>,
    retry_budget: u32,
}

impl<S: DocumentStore> MatchEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn with_retry_budget(store: Arc<S>, retry_budget: u32) -> Self {
        Self {
            store,
            retry_budget,
        }
    }

    /// Open a match by contacting a listing.
    ///
    /// Role mapping follows the listing kind: the owner of an offering is
    /// the provider and the caller becomes the requester; for a request
    /// listing the owner is the requester and the caller provides.
    ///
    /// Claiming the listing (CAS to `Matched`) is the commit point: two
    /// users contacting the same listing concurrently race on that write,
    /// and the loser re-reads a listing that is no longer `Active`.
    pub async fn create_match(
        &self,
        listing_id: ListingId,
        caller: UserId,
        now: i64,
    ) -> Result<Match, ExchangeError> {
        for _ in 0..self.retry_budget {
            let doc = self
                .store
                .get(LISTINGS, *listing_id.as_uuid())
                .await
                .map_err(ExchangeError::from_lookup)?;
            let mut listing: Listing = doc.decode()?;

            if listing.status == ListingStatus::Deleted {
                // Soft-deleted listings are hidden, not just closed.
                return Err(ExchangeError::NotFound {
                    collection: LISTINGS.to_string(),
                    id: *listing_id.as_uuid(),
                });
            }
            if listing.owner == caller {
                return Err(ExchangeError::SelfMatch);
            }
            if listing.status != ListingStatus::Active {
                return Err(ExchangeError::InvalidState {
                    action: "contact",
                    state: listing.status.as_str(),
                });
            }

            let (requester, provider) = match listing.kind {
                ListingKind::Offering => (caller, listing.owner),
                ListingKind::Request => (listing.owner, caller),
            };

            listing.status = ListingStatus::Matched;
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
                Ok(_) => {
                    let m = Match::new(listing_id, requester, provider, now);
                    self.store
                        .insert(MATCHES, *m.match_id.as_uuid(), encode(&m)?, now)
                        .await?;
                    tracing::info!(match_id = %m.match_id, listing_id = %listing_id, "match created");
                    return Ok(m);
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ExchangeError::Conflict {
            attempts: self.retry_budget,
        })
    }

    /// Fetch the current match state.
    pub async fn get_match(&self, match_id: MatchId) -> Result<Match, ExchangeError> {
        let doc = self
            .store
            .get(MATCHES, *match_id.as_uuid())
            .await
            .map_err(ExchangeError::from_lookup)?;
        Ok(doc.decode()?)
    }

    /// Toggle the caller's started flag.
    ///
    /// When both flags become true while the match is still `Wanted`, the
    /// status moves to `InProgress`. Toggling a flag back off never reverts
    /// the status. Setting a flag to its current value is a no-op.
    pub async fn set_started(
        &self,
        match_id: MatchId,
        caller: UserId,
        started: bool,
        now: i64,
    ) -> Result<Match, ExchangeError> {
        let updated = self
            .update_match(match_id, now, |m| {
                let role = m
                    .role_of(caller)
                    .ok_or(ExchangeError::NotParticipant { user: caller })?;
                if m.status.is_terminal() {
                    return Err(ExchangeError::InvalidState {
                        action: "start",
                        state: m.status.as_str(),
                    });
                }
                if m.started(role) == started {
                    return Ok(false);
                }
                m.set_started_flag(role, started);
                if m.status == MatchStatus::Wanted && m.both_started() {
                    m.status = MatchStatus::InProgress;
                }
                Ok(true)
            })
            .await?;
        tracing::debug!(
            match_id = %match_id,
            status = updated.status.as_str(),
            "started flag updated"
        );
        Ok(updated)
    }

    /// Toggle the caller's completed flag.
    ///
    /// Only valid while the match is `InProgress` with both start flags
    /// still set. When both completion flags become true the match moves to
    /// `Completed` and the listing is closed out with it.
    pub async fn set_completed(
        &self,
        match_id: MatchId,
        caller: UserId,
        completed: bool,
        now: i64,
    ) -> Result<Match, ExchangeError> {
        let updated = self
            .update_match(match_id, now, |m| {
                let role = m
                    .role_of(caller)
                    .ok_or(ExchangeError::NotParticipant { user: caller })?;
                if m.status != MatchStatus::InProgress || !m.both_started() {
                    return Err(ExchangeError::InvalidState {
                        action: "complete",
                        state: m.status.as_str(),
                    });
                }
                if m.completed(role) == completed {
                    return Ok(false);
                }
                m.set_completed_flag(role, completed);
                if m.both_completed() {
                    m.status = MatchStatus::Completed;
                }
                Ok(true)
            })
            .await?;
        if updated.status == MatchStatus::Completed {
            self.transition_listing(updated.listing_id, ListingStatus::Completed, now)
                .await?;
            tracing::info!(match_id = %match_id, "match completed");
        }
        Ok(updated)
    }

    /// Cancel a non-terminal match.
    ///
    /// Permitted to either participant, or to the listing owner even when
    /// they are neither side. Flags are left as-is; the listing goes back
    /// to `Active`. Cancelling an already-terminal match fails
    /// `InvalidState`.
    pub async fn cancel(
        &self,
        match_id: MatchId,
        caller: UserId,
        now: i64,
    ) -> Result<Match, ExchangeError> {
        // Ownership never changes, so the permission check happens once
        // up front rather than inside the retry cycle.
        let current = self.get_match(match_id).await?;
        let mut allowed = current.role_of(caller).is_some();
        if !allowed {
            if let Ok(doc) = self.store.get(LISTINGS, *current.listing_id.as_uuid()).await {
                let listing: Listing = doc.decode()?;
                allowed = listing.owner == caller;
            }
        }
        if !allowed {
            return Err(ExchangeError::NotParticipant { user: caller });
        }

        let updated = self
            .update_match(match_id, now, |m| {
                if m.status.is_terminal() {
                    return Err(ExchangeError::InvalidState {
                        action: "cancel",
                        state: m.status.as_str(),
                    });
                }
                m.status = MatchStatus::Cancelled;
                Ok(true)
            })
            .await?;
        self.transition_listing(updated.listing_id, ListingStatus::Active, now)
            .await?;
        tracing::info!(match_id = %match_id, "match cancelled");
        Ok(updated)
    }

    /// Read-modify-CAS cycle over the match document.
    ///
    /// `apply` validates and mutates the freshly-read match; returning
    /// `Ok(false)` marks a validated no-op and skips the write entirely.
    async fn update_match<F>(
        &self,
        match_id: MatchId,
        now: i64,
        mut apply: F,
    ) -> Result<Match, ExchangeError>
    where
        F: FnMut(&mut Match) -> Result<bool, ExchangeError>,
    {
        for attempt in 1..=self.retry_budget {
            let doc = self
                .store
                .get(MATCHES, *match_id.as_uuid())
                .await
                .map_err(ExchangeError::from_lookup)?;
            let mut m: Match = doc.decode()?;
            if !apply(&mut m)? {
                return Ok(m);
            }
            m.updated_at = now;
            match self
                .store
                .compare_and_swap(MATCHES, *match_id.as_uuid(), doc.version, encode(&m)?, now)
                .await
            {
                Ok(_) => return Ok(m),
                Err(StoreError::VersionConflict { .. }) => {
                    tracing::debug!(match_id = %match_id, attempt, "lost version race, re-reading");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ExchangeError::Conflict {
            attempts: self.retry_budget,
        })
    }

    /// Move the listing alongside a match transition.
    ///
    /// Only a listing still marked `Matched` is touched; anything else
    /// (already deleted, already moved) is left alone.
    async fn transition_listing(
        &self,
        listing_id: ListingId,
        to: ListingStatus,
        now: i64,
    ) -> Result<(), ExchangeError> {
        for _ in 0..self.retry_budget {
            let doc = match self.store.get(LISTINGS, *listing_id.as_uuid()).await {
                Ok(doc) => doc,
                Err(StoreError::NotFound { .. }) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            let mut listing: Listing = doc.decode()?;
            if listing.status != ListingStatus::Matched {
                return Ok(());
            }
            listing.status = to;
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
                Ok(_) => return Ok(()),
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ExchangeError::Conflict {
            attempts: self.retry_budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datastore::MemoryStore;

    const T0: i64 = 1_708_123_456_789_000_000;

    async fn seed_listing(store: &MemoryStore, kind: ListingKind) -> Listing {
        let listing = Listing::new(
            UserId::new(),
            kind,
            "Calculus tutoring",
            "One hour sessions",
            "tutoring",
            vec!["math".to_string()],
            T0,
        )
        .unwrap();
        store
            .insert(
                LISTINGS,
                *listing.listing_id.as_uuid(),
                encode(&listing).unwrap(),
                T0,
            )
            .await
            .unwrap();
        listing
    }

    async fn setup() -> (MatchEngine<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (MatchEngine::new(store.clone()), store)
    }

    async fn listing_status(store: &MemoryStore, listing: &Listing) -> ListingStatus {
        store
            .get(LISTINGS, *listing.listing_id.as_uuid())
            .await
            .unwrap()
            .decode::<Listing>()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn test_create_match_offering_roles() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let caller = UserId::new();

        let m = engine
            .create_match(listing.listing_id, caller, T0 + 1)
            .await
            .unwrap();

        assert_eq!(m.requester, caller);
        assert_eq!(m.provider, listing.owner);
        assert_eq!(m.status, MatchStatus::Wanted);
        assert_eq!(listing_status(&store, &listing).await, ListingStatus::Matched);
    }

    #[tokio::test]
    async fn test_create_match_request_roles() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Request).await;
        let caller = UserId::new();

        let m = engine
            .create_match(listing.listing_id, caller, T0 + 1)
            .await
            .unwrap();

        assert_eq!(m.requester, listing.owner);
        assert_eq!(m.provider, caller);
    }

    #[tokio::test]
    async fn test_create_match_own_listing_rejected() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;

        let err = engine
            .create_match(listing.listing_id, listing.owner, T0 + 1)
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::SelfMatch);
    }

    #[tokio::test]
    async fn test_create_match_already_matched_rejected() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();

        let err = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 2)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExchangeError::InvalidState {
                action: "contact",
                state: "matched",
            }
        );
    }

    #[tokio::test]
    async fn test_one_start_keeps_wanted_both_start_progress() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();

        let after_one = engine
            .set_started(m.match_id, m.requester, true, T0 + 2)
            .await
            .unwrap();
        assert_eq!(after_one.status, MatchStatus::Wanted);
        assert!(after_one.requester_started);

        let after_both = engine
            .set_started(m.match_id, m.provider, true, T0 + 3)
            .await
            .unwrap();
        assert_eq!(after_both.status, MatchStatus::InProgress);
        assert!(after_both.both_started());
        assert_eq!(after_both.updated_at, T0 + 3);
    }

    #[tokio::test]
    async fn test_unstart_does_not_revert_status() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();
        engine
            .set_started(m.match_id, m.requester, true, T0 + 2)
            .await
            .unwrap();
        engine
            .set_started(m.match_id, m.provider, true, T0 + 3)
            .await
            .unwrap();

        let after_untoggle = engine
            .set_started(m.match_id, m.requester, false, T0 + 4)
            .await
            .unwrap();
        assert_eq!(after_untoggle.status, MatchStatus::InProgress);
        assert!(!after_untoggle.requester_started);
    }

    #[tokio::test]
    async fn test_set_started_idempotent_per_flag() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();

        engine
            .set_started(m.match_id, m.requester, true, T0 + 2)
            .await
            .unwrap();
        let repeat = engine
            .set_started(m.match_id, m.requester, true, T0 + 5)
            .await
            .unwrap();
        // No-op: nothing was written, updated_at is untouched.
        assert_eq!(repeat.updated_at, T0 + 2);
    }

    #[tokio::test]
    async fn test_complete_before_start_rejected() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();

        let err = engine
            .set_completed(m.match_id, m.requester, true, T0 + 2)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExchangeError::InvalidState {
                action: "complete",
                state: "wanted",
            }
        );
    }

    #[tokio::test]
    async fn test_complete_after_unstart_rejected() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();
        engine
            .set_started(m.match_id, m.requester, true, T0 + 2)
            .await
            .unwrap();
        engine
            .set_started(m.match_id, m.provider, true, T0 + 3)
            .await
            .unwrap();
        engine
            .set_started(m.match_id, m.provider, false, T0 + 4)
            .await
            .unwrap();

        // Status is still in-progress, but completing requires both start
        // flags to be up at the moment of the call.
        let err = engine
            .set_completed(m.match_id, m.requester, true, T0 + 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidState { action: "complete", .. }));
    }

    #[tokio::test]
    async fn test_completion_flow() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();
        engine
            .set_started(m.match_id, m.requester, true, T0 + 2)
            .await
            .unwrap();
        engine
            .set_started(m.match_id, m.provider, true, T0 + 3)
            .await
            .unwrap();

        let after_one = engine
            .set_completed(m.match_id, m.provider, true, T0 + 4)
            .await
            .unwrap();
        assert_eq!(after_one.status, MatchStatus::InProgress);

        let after_both = engine
            .set_completed(m.match_id, m.requester, true, T0 + 5)
            .await
            .unwrap();
        assert_eq!(after_both.status, MatchStatus::Completed);
        assert_eq!(
            listing_status(&store, &listing).await,
            ListingStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_cancel_reopens_listing_and_is_terminal() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();

        let cancelled = engine.cancel(m.match_id, m.requester, T0 + 2).await.unwrap();
        assert_eq!(cancelled.status, MatchStatus::Cancelled);
        assert_eq!(listing_status(&store, &listing).await, ListingStatus::Active);

        let err = engine.cancel(m.match_id, m.requester, T0 + 3).await.unwrap_err();
        assert_eq!(
            err,
            ExchangeError::InvalidState {
                action: "cancel",
                state: "cancelled",
            }
        );
    }

    #[tokio::test]
    async fn test_cancel_keeps_flags() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();
        engine
            .set_started(m.match_id, m.provider, true, T0 + 2)
            .await
            .unwrap();

        let cancelled = engine.cancel(m.match_id, m.provider, T0 + 3).await.unwrap();
        assert!(cancelled.provider_started);
    }

    #[tokio::test]
    async fn test_owner_may_cancel() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();

        // The offering owner is the provider here, so use a request listing
        // shape instead: owner is requester, still a participant. Exercise
        // the owner path with a third-party owner by rewriting the match.
        let outsider_owned = seed_listing(&store, ListingKind::Offering).await;
        let mut hijacked = m.clone();
        hijacked.listing_id = outsider_owned.listing_id;
        let doc = store.get(MATCHES, *m.match_id.as_uuid()).await.unwrap();
        store
            .compare_and_swap(
                MATCHES,
                *m.match_id.as_uuid(),
                doc.version,
                encode(&hijacked).unwrap(),
                T0 + 2,
            )
            .await
            .unwrap();

        let cancelled = engine
            .cancel(m.match_id, outsider_owned.owner, T0 + 3)
            .await
            .unwrap();
        assert_eq!(cancelled.status, MatchStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_non_participant_rejected_everywhere() {
        let (engine, store) = setup().await;
        let listing = seed_listing(&store, ListingKind::Offering).await;
        let m = engine
            .create_match(listing.listing_id, UserId::new(), T0 + 1)
            .await
            .unwrap();
        let outsider = UserId::new();

        for err in [
            engine
                .set_started(m.match_id, outsider, true, T0 + 2)
                .await
                .unwrap_err(),
            engine
                .set_completed(m.match_id, outsider, true, T0 + 2)
                .await
                .unwrap_err(),
            engine.cancel(m.match_id, outsider, T0 + 2).await.unwrap_err(),
        ] {
            assert_eq!(err, ExchangeError::NotParticipant { user: outsider });
        }
    }

    #[tokio::test]
    async fn test_missing_match_is_not_found() {
        let (engine, _store) = setup().await;
        let err = engine
            .set_started(MatchId::new(), UserId::new(), true, T0)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound { .. }));
    }
}
