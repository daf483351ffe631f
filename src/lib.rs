//! Core of a shared gift space: the gift lifecycle, the points ledger, reward
//! redemption and space code allocation.
//!
//! The crate follows a ports and adapters layout. [`domain`] holds the entities
//! and the pure rules, [`ports`] the traits the commands depend on, [`adapters`]
//! the in-memory implementations, and [`commands`] one `tower::Service` per
//! operation.

pub mod adapters;
pub mod commands;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
