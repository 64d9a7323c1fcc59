//! Unique identifier types for exchange entities
//!
//! All IDs use UUID v7 for time-sortable ordering, enabling efficient
//! chronological queries over listings, matches, and messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new id with the current timestamp
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a user account
    ///
    /// Identity itself is provisioned by an external provider; this id is the
    /// handle every document references.
    UserId
}

uuid_id! {
    /// Unique identifier for a service listing
    ListingId
}

uuid_id! {
    /// Unique identifier for a match between a requester and a provider
    MatchId
}

uuid_id! {
    /// Unique identifier for a chat message
    MessageId
}

uuid_id! {
    /// Unique identifier for a sending device
    ///
    /// Rate-limit windows are tracked per (match, device), so each device a
    /// user chats from carries its own quota.
    DeviceId
}
