//! Match Engine Service
//!
//! Authoritative state machine for the match lifecycle:
//! `wanted -> in-progress -> completed`, with `cancelled` reachable from
//! either non-terminal state.
//!
//! **Key Invariants:**
//! - `in-progress` is only reached when both participants have started
//! - `completed` is only reached from `in-progress` with both start flags
//!   set and both completion flags set
//! - Terminal states accept no further transitions
//! - Every write is a read-modify-CAS cycle; concurrent flag updates from
//!   both participants cannot overwrite each other

pub mod engine;

pub use engine::MatchEngine;
