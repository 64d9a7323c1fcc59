//! Match lifecycle types
//!
//! A match pairs the two participants of one service listing: the requester
//! (who receives the service) and the provider (who performs it). The status
//! machine is `wanted -> in-progress -> completed`, with `cancelled`
//! reachable from either non-terminal state.
//!
//! The started/completed flags are per-participant toggles. Status only
//! moves forward when both sides agree; toggling a flag back off never
//! reverts an already-reached status.

use crate::ids::{ListingId, MatchId, UserId};
use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Match lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    Wanted,
    InProgress,
    Completed,
    Cancelled,
}

impl MatchStatus {
    /// Check if the status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }

    /// Status label for error messages and logging
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Wanted => "wanted",
            MatchStatus::InProgress => "in-progress",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

/// Which side of a match a participant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Requester,
    Provider,
}

impl Role {
    /// Get the opposite role
    pub fn opposite(&self) -> Self {
        match self {
            Role::Requester => Role::Provider,
            Role::Provider => Role::Requester,
        }
    }
}

/// A match between a requester and a provider for one listing
///
/// The messages array is append-only; the per-role flags and `status` are
/// the only other mutable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub match_id: MatchId,
    pub listing_id: ListingId,
    pub requester: UserId,
    pub provider: UserId,
    pub status: MatchStatus,
    pub requester_started: bool,
    pub provider_started: bool,
    pub requester_completed: bool,
    pub provider_completed: bool,
    pub messages: Vec<Message>,
    /// Unix nanoseconds
    pub created_at: i64,
    /// Unix nanoseconds
    pub updated_at: i64,
}

impl Match {
    /// Create a new match in `Wanted` with all flags cleared.
    ///
    /// Participants must be distinct; the engine guarantees this by rejecting
    /// self-contacts before construction.
    pub fn new(
        listing_id: ListingId,
        requester: UserId,
        provider: UserId,
        timestamp: i64,
    ) -> Self {
        Self {
            match_id: MatchId::new(),
            listing_id,
            requester,
            provider,
            status: MatchStatus::Wanted,
            requester_started: false,
            provider_started: false,
            requester_completed: false,
            provider_completed: false,
            messages: Vec::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Which role the given user plays in this match, if any.
    pub fn role_of(&self, user: UserId) -> Option<Role> {
        if user == self.requester {
            Some(Role::Requester)
        } else if user == self.provider {
            Some(Role::Provider)
        } else {
            None
        }
    }

    /// The user on the given side.
    pub fn participant(&self, role: Role) -> UserId {
        match role {
            Role::Requester => self.requester,
            Role::Provider => self.provider,
        }
    }

    pub fn started(&self, role: Role) -> bool {
        match role {
            Role::Requester => self.requester_started,
            Role::Provider => self.provider_started,
        }
    }

    pub fn set_started_flag(&mut self, role: Role, started: bool) {
        match role {
            Role::Requester => self.requester_started = started,
            Role::Provider => self.provider_started = started,
        }
    }

    pub fn completed(&self, role: Role) -> bool {
        match role {
            Role::Requester => self.requester_completed,
            Role::Provider => self.provider_completed,
        }
    }

    pub fn set_completed_flag(&mut self, role: Role, completed: bool) {
        match role {
            Role::Requester => self.requester_completed = completed,
            Role::Provider => self.provider_completed = completed,
        }
    }

    pub fn both_started(&self) -> bool {
        self.requester_started && self.provider_started
    }

    pub fn both_completed(&self) -> bool {
        self.requester_completed && self.provider_completed
    }

    /// Messages addressed to `reader` that have not been read yet.
    pub fn unread_count(&self, reader: UserId) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sender != reader && !m.read)
            .count()
    }
}
