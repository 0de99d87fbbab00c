//! Shared domain types, errors, and configuration for Souk.
//!
//! Souk mediates data-marketplace transactions between buyers and vendors:
//! a semantic dataset catalog, a tool-calling conversational agent, and a
//! formal inquiry workflow. This crate holds the value objects and
//! cross-cutting concerns every other crate builds on.

pub mod config;
pub mod error;
pub mod types;

pub use config::SoukConfig;
pub use error::{Result, SoukError};
pub use types::*;
