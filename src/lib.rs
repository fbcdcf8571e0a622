//! designsync - dynamic schema synchronization for versioned designs
//!
//! Turns survey and participant property designs into tenant tables.
//! Schema evolution is additive only and every design version is applied
//! at most once, atomically.

pub mod cli;
pub mod design;
pub mod observability;
pub mod schema;
pub mod sync;
pub mod version;
pub mod versions;
