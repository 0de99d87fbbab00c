//! Inquiry workflow for Souk.
//!
//! An inquiry is the transactional record of a buyer's interest in a
//! vendor's dataset and the vendor's response to it. This crate owns the
//! inquiry lifecycle: the party-qualified transition legality table, the
//! asymmetric write authority over the two payloads, and the serialized
//! in-memory store that applies transitions atomically.

pub mod error;
pub mod state_machine;
pub mod store;
pub mod types;

pub use error::InquiryError;
pub use state_machine::{is_terminal, validate_transition};
pub use store::InquiryStore;
pub use types::{Inquiry, InquiryStatus, Party};
