//! Inquiry state machine with party-qualified transition validation.
//!
//! Legal transitions:
//! - buyer:  draft -> submitted, responded -> accepted, responded -> rejected
//! - vendor: submitted -> pending_review, submitted -> responded,
//!           pending_review -> responded
//!
//! The vendor may respond directly from `submitted` without an explicit
//! review step; both vendor paths into `responded` are legal. `accepted`
//! and `rejected` are terminal.

use crate::error::InquiryError;
use crate::types::{InquiryStatus, Party};

/// Validate that `party` may move an inquiry from `from` to `to`.
///
/// Any triple not in the table fails with [`InquiryError::IllegalTransition`]
/// naming the current state and the attempted target.
pub fn validate_transition(
    party: Party,
    from: InquiryStatus,
    to: InquiryStatus,
) -> Result<(), InquiryError> {
    use InquiryStatus::*;
    use Party::*;

    let valid = matches!(
        (party, from, to),
        (Buyer, Draft, Submitted)
            | (Vendor, Submitted, PendingReview)
            | (Vendor, Submitted, Responded)
            | (Vendor, PendingReview, Responded)
            | (Buyer, Responded, Accepted)
            | (Buyer, Responded, Rejected)
    );

    if valid {
        Ok(())
    } else {
        Err(InquiryError::IllegalTransition { party, from, to })
    }
}

/// True for states that admit no further transitions.
pub fn is_terminal(status: InquiryStatus) -> bool {
    matches!(status, InquiryStatus::Accepted | InquiryStatus::Rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [InquiryStatus; 6] = [
        InquiryStatus::Draft,
        InquiryStatus::Submitted,
        InquiryStatus::PendingReview,
        InquiryStatus::Responded,
        InquiryStatus::Accepted,
        InquiryStatus::Rejected,
    ];

    // =====================================================================
    // Valid transitions
    // =====================================================================

    #[test]
    fn test_buyer_draft_to_submitted() {
        assert!(
            validate_transition(Party::Buyer, InquiryStatus::Draft, InquiryStatus::Submitted)
                .is_ok()
        );
    }

    #[test]
    fn test_vendor_submitted_to_pending_review() {
        assert!(validate_transition(
            Party::Vendor,
            InquiryStatus::Submitted,
            InquiryStatus::PendingReview
        )
        .is_ok());
    }

    #[test]
    fn test_vendor_submitted_directly_to_responded() {
        assert!(validate_transition(
            Party::Vendor,
            InquiryStatus::Submitted,
            InquiryStatus::Responded
        )
        .is_ok());
    }

    #[test]
    fn test_vendor_pending_review_to_responded() {
        assert!(validate_transition(
            Party::Vendor,
            InquiryStatus::PendingReview,
            InquiryStatus::Responded
        )
        .is_ok());
    }

    #[test]
    fn test_buyer_responded_to_accepted() {
        assert!(validate_transition(
            Party::Buyer,
            InquiryStatus::Responded,
            InquiryStatus::Accepted
        )
        .is_ok());
    }

    #[test]
    fn test_buyer_responded_to_rejected() {
        assert!(validate_transition(
            Party::Buyer,
            InquiryStatus::Responded,
            InquiryStatus::Rejected
        )
        .is_ok());
    }

    // =====================================================================
    // Invalid transitions
    // =====================================================================

    #[test]
    fn test_vendor_cannot_submit() {
        let err = validate_transition(
            Party::Vendor,
            InquiryStatus::Draft,
            InquiryStatus::Submitted,
        )
        .unwrap_err();
        assert!(matches!(err, InquiryError::IllegalTransition { .. }));
    }

    #[test]
    fn test_buyer_cannot_respond() {
        assert!(validate_transition(
            Party::Buyer,
            InquiryStatus::Submitted,
            InquiryStatus::Responded
        )
        .is_err());
        assert!(validate_transition(
            Party::Buyer,
            InquiryStatus::PendingReview,
            InquiryStatus::Responded
        )
        .is_err());
    }

    #[test]
    fn test_vendor_cannot_accept_or_reject() {
        assert!(validate_transition(
            Party::Vendor,
            InquiryStatus::Responded,
            InquiryStatus::Accepted
        )
        .is_err());
        assert!(validate_transition(
            Party::Vendor,
            InquiryStatus::Responded,
            InquiryStatus::Rejected
        )
        .is_err());
    }

    #[test]
    fn test_no_skipping_draft_to_responded() {
        for party in [Party::Buyer, Party::Vendor] {
            assert!(
                validate_transition(party, InquiryStatus::Draft, InquiryStatus::Responded)
                    .is_err()
            );
            assert!(
                validate_transition(party, InquiryStatus::Draft, InquiryStatus::Accepted)
                    .is_err()
            );
        }
    }

    #[test]
    fn test_no_skipping_submitted_to_accepted() {
        for party in [Party::Buyer, Party::Vendor] {
            assert!(validate_transition(
                party,
                InquiryStatus::Submitted,
                InquiryStatus::Accepted
            )
            .is_err());
        }
    }

    #[test]
    fn test_self_transitions_invalid() {
        for party in [Party::Buyer, Party::Vendor] {
            for status in ALL_STATUSES {
                assert!(validate_transition(party, status, status).is_err());
            }
        }
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        for terminal in [InquiryStatus::Accepted, InquiryStatus::Rejected] {
            for party in [Party::Buyer, Party::Vendor] {
                for target in ALL_STATUSES {
                    assert!(validate_transition(party, terminal, target).is_err());
                }
            }
        }
    }

    #[test]
    fn test_no_backwards_transitions() {
        for party in [Party::Buyer, Party::Vendor] {
            assert!(validate_transition(party, InquiryStatus::Submitted, InquiryStatus::Draft)
                .is_err());
            assert!(validate_transition(
                party,
                InquiryStatus::Responded,
                InquiryStatus::Submitted
            )
            .is_err());
            assert!(validate_transition(
                party,
                InquiryStatus::PendingReview,
                InquiryStatus::Submitted
            )
            .is_err());
        }
    }

    #[test]
    fn test_exactly_six_legal_transitions() {
        let mut valid_count = 0;
        for party in [Party::Buyer, Party::Vendor] {
            for from in ALL_STATUSES {
                for to in ALL_STATUSES {
                    if validate_transition(party, from, to).is_ok() {
                        valid_count += 1;
                    }
                }
            }
        }
        assert_eq!(valid_count, 6, "Expected exactly 6 legal transitions");
    }

    #[test]
    fn test_error_names_current_and_target() {
        let err = validate_transition(
            Party::Buyer,
            InquiryStatus::Submitted,
            InquiryStatus::Submitted,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("submitted -> submitted"));
    }

    // =====================================================================
    // Terminal predicate
    // =====================================================================

    #[test]
    fn test_is_terminal() {
        assert!(is_terminal(InquiryStatus::Accepted));
        assert!(is_terminal(InquiryStatus::Rejected));
        assert!(!is_terminal(InquiryStatus::Draft));
        assert!(!is_terminal(InquiryStatus::Submitted));
        assert!(!is_terminal(InquiryStatus::PendingReview));
        assert!(!is_terminal(InquiryStatus::Responded));
    }
}
