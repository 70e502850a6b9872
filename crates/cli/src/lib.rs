//! Command-line client of the tally server.
//!
//! Keeps a replica of the records on disk, applies every edit locally
//! through the shared engine and synchronizes with the server on demand.

pub mod actions;
pub mod client;
pub mod config;
pub mod error;
pub mod local_state;
