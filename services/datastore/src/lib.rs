//! Data-access layer for the campus service exchange
//!
//! Exposes the generic document-store interface every service writes
//! through, plus an in-memory reference implementation:
//! - Versioned documents with compare-and-swap as the only update primitive
//! - Predicate queries
//! - Push-based per-document change feeds for live subscriptions
//!
//! Blind overwrites are deliberately not offered: every mutation of a shared
//! document goes through a read-modify-CAS cycle, so concurrent writers from
//! both sides of a match cannot lose each other's updates.

pub mod document;
pub mod memory;

pub use document::{Document, DocumentStore};
pub use memory::MemoryStore;

/// Collection names used by the exchange services
pub mod collections {
    pub const LISTINGS: &str = "listings";
    pub const MATCHES: &str = "matches";
}
