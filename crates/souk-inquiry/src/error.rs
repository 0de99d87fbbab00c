//! Error types for the inquiry workflow.

use uuid::Uuid;

use crate::types::{InquiryStatus, Party};

/// Errors from inquiry lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum InquiryError {
    #[error("Inquiry not found: {0}")]
    NotFound(Uuid),

    /// The attempted transition is not in the legality table. Carries the
    /// current state and the attempted target; the inquiry is left
    /// unchanged and the state is never coerced to a "closest legal" one.
    #[error("Illegal transition for {party}: {from} -> {to}")]
    IllegalTransition {
        party: Party,
        from: InquiryStatus,
        to: InquiryStatus,
    },

    /// `buyer_inquiry` may only be written while the status is `draft`;
    /// afterwards amendments require a new inquiry.
    #[error("Buyer inquiry is frozen once submitted (status: {0})")]
    PayloadFrozen(InquiryStatus),

    /// A vendor response transition requires a non-empty payload.
    #[error("Vendor response payload must not be empty")]
    EmptyResponse,

    #[error("Store error: {0}")]
    Store(String),
}
