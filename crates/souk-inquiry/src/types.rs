//! Inquiry value objects and their supporting enumerations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Inquiry lifecycle states (wire values are snake_case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    Draft,
    Submitted,
    PendingReview,
    Responded,
    Accepted,
    Rejected,
}

impl fmt::Display for InquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InquiryStatus::Draft => write!(f, "draft"),
            InquiryStatus::Submitted => write!(f, "submitted"),
            InquiryStatus::PendingReview => write!(f, "pending_review"),
            InquiryStatus::Responded => write!(f, "responded"),
            InquiryStatus::Accepted => write!(f, "accepted"),
            InquiryStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for InquiryStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InquiryStatus::Draft),
            "submitted" => Ok(InquiryStatus::Submitted),
            "pending_review" => Ok(InquiryStatus::PendingReview),
            "responded" => Ok(InquiryStatus::Responded),
            "accepted" => Ok(InquiryStatus::Accepted),
            "rejected" => Ok(InquiryStatus::Rejected),
            _ => Err(format!("Unknown inquiry status: {}", s)),
        }
    }
}

/// Which side of the transaction is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Buyer,
    Vendor,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Buyer => write!(f, "buyer"),
            Party::Vendor => write!(f, "vendor"),
        }
    }
}

/// A buyer's inquiry about a dataset and the vendor's response to it.
///
/// The two JSON payloads are owned asymmetrically: `buyer_inquiry` is
/// written only by the buyer side (and only while the status is `Draft`),
/// `vendor_response` only by the vendor side. Neither party ever mutates
/// the other's payload; each reads the counterpart as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub vendor_id: Uuid,
    pub dataset_id: Uuid,
    /// The conversation the inquiry originated from, if any.
    pub conversation_id: Option<Uuid>,
    /// Free-form buyer payload (use case, budget, timeline, notes).
    pub buyer_inquiry: Value,
    /// Free-form vendor payload (pricing, delivery, terms). `Null` until
    /// the vendor responds.
    pub vendor_response: Value,
    pub status: InquiryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Per-party soft-delete markers. The row itself is never removed
    /// while either side still holds an active reference.
    #[serde(default)]
    pub buyer_archived: bool,
    #[serde(default)]
    pub vendor_archived: bool,
}

impl Inquiry {
    /// Create a fresh draft.
    pub fn draft(
        buyer_id: Uuid,
        vendor_id: Uuid,
        dataset_id: Uuid,
        conversation_id: Option<Uuid>,
        buyer_inquiry: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            buyer_id,
            vendor_id,
            dataset_id,
            conversation_id,
            buyer_inquiry,
            vendor_response: Value::Null,
            status: InquiryStatus::Draft,
            created_at: now,
            updated_at: now,
            buyer_archived: false,
            vendor_archived: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_values() {
        for (status, wire) in [
            (InquiryStatus::Draft, "\"draft\""),
            (InquiryStatus::Submitted, "\"submitted\""),
            (InquiryStatus::PendingReview, "\"pending_review\""),
            (InquiryStatus::Responded, "\"responded\""),
            (InquiryStatus::Accepted, "\"accepted\""),
            (InquiryStatus::Rejected, "\"rejected\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), wire);
            let back: InquiryStatus = serde_json::from_str(wire).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_status_display_matches_from_str() {
        for status in [
            InquiryStatus::Draft,
            InquiryStatus::Submitted,
            InquiryStatus::PendingReview,
            InquiryStatus::Responded,
            InquiryStatus::Accepted,
            InquiryStatus::Rejected,
        ] {
            let round: InquiryStatus = status.to_string().parse().unwrap();
            assert_eq!(round, status);
        }
        assert!("open".parse::<InquiryStatus>().is_err());
    }

    #[test]
    fn test_party_display() {
        assert_eq!(Party::Buyer.to_string(), "buyer");
        assert_eq!(Party::Vendor.to_string(), "vendor");
    }

    #[test]
    fn test_draft_construction() {
        let payload = serde_json::json!({"budget": 5000, "use_case": "modeling"});
        let inquiry = Inquiry::draft(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            payload.clone(),
        );
        assert_eq!(inquiry.status, InquiryStatus::Draft);
        assert_eq!(inquiry.buyer_inquiry, payload);
        assert!(inquiry.vendor_response.is_null());
        assert!(!inquiry.buyer_archived);
        assert!(!inquiry.vendor_archived);
    }
}
