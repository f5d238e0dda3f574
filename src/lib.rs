//! Library behind the dailytube command-line tools.
//!
//! Tracks the uploads of a single creator's channel in a local SQLite
//! database and rotates a "today's video" pick across them. The binaries in
//! `src/bin` are thin wrappers over these modules.

pub mod channel;
pub mod config;
pub mod error;
pub mod ingest;
pub mod rotation;
pub mod security;
pub mod store;
