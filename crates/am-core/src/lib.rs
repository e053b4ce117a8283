//! Shared data model and configuration for the automend workspace.
//!
//! `am-core` owns the types that cross crate boundaries: cycle kinds and
//! reports, collaborator payloads (events, proposals, outcomes), the
//! configuration tree, and the TOML-backed config store.

pub mod config;
pub mod store;
pub mod types;
