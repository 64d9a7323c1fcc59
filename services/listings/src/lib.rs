//! Listings Service
//!
//! The marketplace directory: users post offerings and requests, browse and
//! filter what's active, edit their own posts, and soft-delete them.
//! Listing status during a match (`matched`, `completed`, back to `active`
//! on cancel) is driven by the match engine, not here.

pub mod directory;

pub use directory::{ListingDirectory, ListingFilter, ListingPatch};
