//! Messaging Service
//!
//! Chat attached to a match: an append-only message log embedded in the
//! match document, with read tracking, client-side send validation, and
//! live subscriptions.
//!
//! The service splits into two decoupled layers:
//! - `chat` + `subscription`: operations against the authoritative store
//! - `outbox`: the client-side optimistic layer that renders a message
//!   immediately, reconciles once the authoritative copy arrives, and rolls
//!   the draft back into the composer when a send fails
//!
//! Send-rate limiting (`rate_limit`) is deliberately client-local: it is a
//! UX throttle per (match, device), not a server-enforced abuse control.

pub mod chat;
pub mod outbox;
pub mod rate_limit;
pub mod subscription;

pub use chat::{ChatConfig, ChatService};
pub use outbox::{LocalEcho, Outbox};
pub use rate_limit::{QuotaConfig, SendQuota};
pub use subscription::SubscriptionHandle;
