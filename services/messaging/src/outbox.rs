//! Optimistic send layer for chat clients
//!
//! The composer renders messages the moment the user hits send, before the
//! store acknowledges the write. This module owns that speculative state,
//! kept strictly apart from the authoritative match document:
//!
//! 1. `stage` records a local echo for immediate rendering
//! 2. on acknowledgement, `commit` retires the echo (the authoritative copy
//!    arrives through the subscription and replaces it on screen)
//! 3. on failure, `roll_back` removes the echo and returns the draft so the
//!    composer can be refilled and the user keeps their text

use types::ids::UserId;
use types::matching::Match;
use uuid::Uuid;

/// A message rendered locally while its write is in flight
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEcho {
    pub echo_id: Uuid,
    pub sender: UserId,
    pub content: String,
    /// Unix nanoseconds at staging time
    pub staged_at: i64,
}

/// Pending local echoes for one chat view
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<LocalEcho>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local echo for content about to be sent.
    pub fn stage(&mut self, sender: UserId, content: &str, now: i64) -> LocalEcho {
        let echo = LocalEcho {
            echo_id: Uuid::now_v7(),
            sender,
            content: content.trim().to_string(),
            staged_at: now,
        };
        self.pending.push(echo.clone());
        echo
    }

    /// Echoes still awaiting acknowledgement, in staging order.
    pub fn pending(&self) -> &[LocalEcho] {
        &self.pending
    }

    /// Retire an echo whose write was acknowledged.
    pub fn commit(&mut self, echo_id: Uuid) -> bool {
        let before = self.pending.len();
        self.pending.retain(|echo| echo.echo_id != echo_id);
        self.pending.len() < before
    }

    /// Remove a failed echo and hand the draft back for the composer.
    pub fn roll_back(&mut self, echo_id: Uuid) -> Option<String> {
        let index = self
            .pending
            .iter()
            .position(|echo| echo.echo_id == echo_id)?;
        Some(self.pending.remove(index).content)
    }

    /// Drop echoes that are already visible in an authoritative match.
    ///
    /// Belt-and-braces path for reconciliation when an acknowledgement was
    /// lost but the subscription delivered the persisted message anyway:
    /// an echo is resolved once a message with the same sender and content
    /// staged no later than its timestamp exists in the log.
    pub fn reconcile(&mut self, authoritative: &Match) -> usize {
        let before = self.pending.len();
        self.pending.retain(|echo| {
            !authoritative
                .messages
                .iter()
                .any(|msg| msg.sender == echo.sender && msg.content == echo.content
                    && msg.sent_at >= echo.staged_at)
        });
        before - self.pending.len()
    }
}
