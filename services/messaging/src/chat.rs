//! Chat operations against the authoritative match document

use std::sync::Arc;

use datastore::collections::MATCHES;
use datastore::document::{encode, DocumentStore};
use types::errors::{ExchangeError, StoreError};
use types::ids::{DeviceId, MatchId, UserId};
use types::matching::Match;
use types::message::{Message, MAX_MESSAGE_LEN};

use crate::rate_limit::{QuotaConfig, SendQuota};
use crate::subscription::{self, SubscriptionHandle};

/// Chat service parameters
#[derive(Debug, Clone, Default)]
pub struct ChatConfig {
    pub quota: QuotaConfig,
    /// CAS attempts per write; 0 falls back to the default.
    pub retry_budget: u32,
}

const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Message log operations over a match document
///
/// Sends validate locally (trim, length, rate limit) before touching the
/// store, then append through the same read-modify-CAS cycle the match
/// engine uses, so concurrent senders interleave without losing messages.
pub struct ChatService<S> {
    store: Arc<S>,
    quota: SendQuota,
    retry_budget: u32,
}

impl<S: DocumentStore> ChatService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, ChatConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: ChatConfig) -> Self {
        let retry_budget = if config.retry_budget == 0 {
            DEFAULT_RETRY_BUDGET
        } else {
            config.retry_budget
        };
        Self {
            store,
            quota: SendQuota::new(config.quota),
            retry_budget,
        }
    }

    /// Append a message to the match's log.
    ///
    /// Local validation order: empty after trim, length cap, send quota.
    /// All three fail without a store round-trip. The append itself re-reads
    /// on version conflicts so a concurrent message from the other side is
    /// never clobbered.
    pub async fn send(
        &self,
        match_id: MatchId,
        sender: UserId,
        device: DeviceId,
        content: &str,
        now: i64,
    ) -> Result<Message, ExchangeError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ExchangeError::EmptyContent);
        }
        let len = trimmed.chars().count();
        if len > MAX_MESSAGE_LEN {
            return Err(ExchangeError::TooLong {
                len,
                max: MAX_MESSAGE_LEN,
            });
        }
        self.quota.check(match_id, device, now)?;

        for _ in 0..self.retry_budget {
            let doc = self
                .store
                .get(MATCHES, *match_id.as_uuid())
                .await
                .map_err(ExchangeError::from_lookup)?;
            let mut m: Match = doc.decode()?;

            if m.role_of(sender).is_none() {
                return Err(ExchangeError::NotParticipant { user: sender });
            }
            if m.status.is_terminal() {
                return Err(ExchangeError::InvalidState {
                    action: "send",
                    state: m.status.as_str(),
                });
            }

            let message = Message::new(sender, trimmed.to_string(), now);
            m.messages.push(message.clone());
            m.updated_at = now;

            match self
                .store
                .compare_and_swap(MATCHES, *match_id.as_uuid(), doc.version, encode(&m)?, now)
                .await
            {
                Ok(_) => {
                    tracing::debug!(match_id = %match_id, message_id = %message.message_id, "message sent");
                    return Ok(message);
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ExchangeError::Conflict {
            attempts: self.retry_budget,
        })
    }

    /// Mark every message not authored by `reader` as read.
    ///
    /// Returns the number of messages flipped. Reads are not tracked once a
    /// match is terminal; calling this on a completed or cancelled match is
    /// a successful no-op. When nothing would change, no write is issued.
    pub async fn mark_read(
        &self,
        match_id: MatchId,
        reader: UserId,
        now: i64,
    ) -> Result<usize, ExchangeError> {
        for _ in 0..self.retry_budget {
            let doc = self
                .store
                .get(MATCHES, *match_id.as_uuid())
                .await
                .map_err(ExchangeError::from_lookup)?;
            let mut m: Match = doc.decode()?;

            if m.role_of(reader).is_none() {
                return Err(ExchangeError::NotParticipant { user: reader });
            }
            if m.status.is_terminal() {
                return Ok(0);
            }

            let mut flipped = 0;
            for message in m.messages.iter_mut() {
                if message.sender != reader && !message.read {
                    message.read = true;
                    flipped += 1;
                }
            }
            if flipped == 0 {
                return Ok(0);
            }
            m.updated_at = now;

            match self
                .store
                .compare_and_swap(MATCHES, *match_id.as_uuid(), doc.version, encode(&m)?, now)
                .await
            {
                Ok(_) => return Ok(flipped),
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ExchangeError::Conflict {
            attempts: self.retry_budget,
        })
    }

    /// Current match state including the full message log.
    pub async fn fetch(&self, match_id: MatchId) -> Result<Match, ExchangeError> {
        let doc = self
            .store
            .get(MATCHES, *match_id.as_uuid())
            .await
            .map_err(ExchangeError::from_lookup)?;
        Ok(doc.decode()?)
    }

    /// Unread messages waiting for `reader`.
    pub async fn unread_count(
        &self,
        match_id: MatchId,
        reader: UserId,
    ) -> Result<usize, ExchangeError> {
        Ok(self.fetch(match_id).await?.unread_count(reader))
    }

    /// Live-update subscription for one match.
    ///
    /// The callback receives the full current match on every change. At most
    /// one live subscription per (match, consumer) is expected; drop or
    /// `unsubscribe()` the handle on teardown, after which no further
    /// callbacks are delivered.
    pub fn subscribe<F>(&self, match_id: MatchId, callback: F) -> SubscriptionHandle
    where
        F: FnMut(Match) + Send + 'static,
    {
        subscription::subscribe(self.store.as_ref(), match_id, callback)
    }
}
