//! # NewsBias Common Library
//!
//! Shared code for the NewsBias ledger service and its tooling:
//! - Event types (LedgerEvent enum) and the EventBus
//! - Configuration loading
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
