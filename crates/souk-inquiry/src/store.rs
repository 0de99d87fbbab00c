//! In-memory inquiry store with serialized, atomic transitions.
//!
//! Every operation is a single check-then-set under the store lock:
//! concurrent transition attempts on the same inquiry are serialized, and
//! the loser of a race observes the winner's state and receives
//! `IllegalTransition` instead of corrupting the row. Rows are never
//! physically removed; each party can only archive its own view.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::InquiryError;
use crate::state_machine::validate_transition;
use crate::types::{Inquiry, InquiryStatus, Party};

/// Thread-safe store owning all inquiry rows.
#[derive(Debug, Default)]
pub struct InquiryStore {
    rows: Mutex<HashMap<Uuid, Inquiry>>,
}

impl InquiryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a draft inquiry from a buyer about a dataset.
    ///
    /// Drafting is cheap and reversible; nothing is visible to the vendor
    /// until the buyer submits.
    pub fn create_draft(
        &self,
        buyer_id: Uuid,
        vendor_id: Uuid,
        dataset_id: Uuid,
        conversation_id: Option<Uuid>,
        buyer_inquiry: Value,
    ) -> Result<Inquiry, InquiryError> {
        let inquiry = Inquiry::draft(buyer_id, vendor_id, dataset_id, conversation_id, buyer_inquiry);
        let mut rows = self.lock()?;
        rows.insert(inquiry.id, inquiry.clone());
        info!(inquiry = %inquiry.id, dataset = %dataset_id, "Inquiry draft created");
        Ok(inquiry)
    }

    /// Fetch an inquiry by id.
    pub fn get(&self, id: Uuid) -> Result<Inquiry, InquiryError> {
        let rows = self.lock()?;
        rows.get(&id).cloned().ok_or(InquiryError::NotFound(id))
    }

    /// Replace the buyer payload. Only legal while the inquiry is a draft;
    /// once submitted the payload is frozen and amendments require a new
    /// inquiry.
    pub fn set_buyer_inquiry(&self, id: Uuid, payload: Value) -> Result<Inquiry, InquiryError> {
        let mut rows = self.lock()?;
        let row = rows.get_mut(&id).ok_or(InquiryError::NotFound(id))?;
        if row.status != InquiryStatus::Draft {
            return Err(InquiryError::PayloadFrozen(row.status));
        }
        row.buyer_inquiry = payload;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    /// Buyer submits the draft: `draft -> submitted`.
    ///
    /// The confirmation gate for this irreversible step lives upstream in
    /// the dispatcher; the store only enforces transition legality.
    pub fn submit(&self, id: Uuid) -> Result<Inquiry, InquiryError> {
        self.transition(id, Party::Buyer, InquiryStatus::Submitted)
    }

    /// Vendor marks human review as started: `submitted -> pending_review`.
    pub fn begin_review(&self, id: Uuid) -> Result<Inquiry, InquiryError> {
        self.transition(id, Party::Vendor, InquiryStatus::PendingReview)
    }

    /// Vendor responds with a non-empty payload:
    /// `submitted | pending_review -> responded`.
    pub fn respond(&self, id: Uuid, payload: Value) -> Result<Inquiry, InquiryError> {
        if payload.is_null() || payload.as_object().is_some_and(|o| o.is_empty()) {
            return Err(InquiryError::EmptyResponse);
        }

        let mut rows = self.lock()?;
        let row = rows.get_mut(&id).ok_or(InquiryError::NotFound(id))?;
        validate_transition(Party::Vendor, row.status, InquiryStatus::Responded)?;
        row.vendor_response = payload;
        row.status = InquiryStatus::Responded;
        row.updated_at = Utc::now();
        info!(inquiry = %id, "Vendor responded");
        Ok(row.clone())
    }

    /// Buyer accepts the vendor's response: `responded -> accepted`.
    pub fn accept(&self, id: Uuid) -> Result<Inquiry, InquiryError> {
        self.transition(id, Party::Buyer, InquiryStatus::Accepted)
    }

    /// Buyer rejects the vendor's response: `responded -> rejected`.
    pub fn reject(&self, id: Uuid) -> Result<Inquiry, InquiryError> {
        self.transition(id, Party::Buyer, InquiryStatus::Rejected)
    }

    /// Inquiries awaiting vendor attention (`submitted` or
    /// `pending_review`), oldest first, archived rows excluded.
    pub fn list_pending_for_vendor(&self, vendor_id: Uuid) -> Result<Vec<Inquiry>, InquiryError> {
        let rows = self.lock()?;
        let mut pending: Vec<Inquiry> = rows
            .values()
            .filter(|i| {
                i.vendor_id == vendor_id
                    && !i.vendor_archived
                    && matches!(
                        i.status,
                        InquiryStatus::Submitted | InquiryStatus::PendingReview
                    )
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(pending)
    }

    /// All of a buyer's inquiries, newest first, archived rows excluded.
    pub fn list_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<Inquiry>, InquiryError> {
        let rows = self.lock()?;
        let mut owned: Vec<Inquiry> = rows
            .values()
            .filter(|i| i.buyer_id == buyer_id && !i.buyer_archived)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(owned)
    }

    /// Soft-delete one party's view of an inquiry. The row stays: the
    /// other party may still hold an active reference.
    pub fn archive(&self, id: Uuid, party: Party) -> Result<(), InquiryError> {
        let mut rows = self.lock()?;
        let row = rows.get_mut(&id).ok_or(InquiryError::NotFound(id))?;
        match party {
            Party::Buyer => row.buyer_archived = true,
            Party::Vendor => row.vendor_archived = true,
        }
        row.updated_at = Utc::now();
        Ok(())
    }

    /// True if any inquiry references the given conversation. Used to
    /// guard conversation purges.
    pub fn references_conversation(&self, conversation_id: Uuid) -> bool {
        self.lock()
            .map(|rows| {
                rows.values()
                    .any(|i| i.conversation_id == Some(conversation_id))
            })
            .unwrap_or(false)
    }

    /// Number of inquiries in the store (archived rows included).
    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// True if the store holds no inquiries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- Private helpers --

    /// Atomic check-then-set for payload-free transitions.
    fn transition(
        &self,
        id: Uuid,
        party: Party,
        target: InquiryStatus,
    ) -> Result<Inquiry, InquiryError> {
        let mut rows = self.lock()?;
        let row = rows.get_mut(&id).ok_or(InquiryError::NotFound(id))?;
        validate_transition(party, row.status, target)?;
        row.status = target;
        row.updated_at = Utc::now();
        info!(inquiry = %id, status = %target, "Inquiry transitioned");
        Ok(row.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Inquiry>>, InquiryError> {
        self.rows
            .lock()
            .map_err(|e| InquiryError::Store(format!("lock poisoned: {}", e)))
    }
}
