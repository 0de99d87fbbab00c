//! Conversation entity context.
//!
//! Tool results mention datasets and inquiries; the context remembers the
//! most recent of each so later turns ("tell me more about the crypto
//! one") resolve against remembered entities instead of re-querying.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use souk_core::types::{ToolCallRecord, ToolCallStatus};

/// A remembered dataset reference.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRef {
    pub id: Uuid,
    pub title: String,
    pub domain: String,
}

/// A remembered inquiry reference.
#[derive(Debug, Clone, PartialEq)]
pub struct InquiryRef {
    pub id: Uuid,
    pub status: String,
}

/// Rolling set of entity references carried across turns of one
/// conversation. Most recent first, capped at a fixed capacity.
#[derive(Debug, Clone)]
pub struct EntityContext {
    capacity: usize,
    datasets: Vec<DatasetRef>,
    inquiries: Vec<InquiryRef>,
}

impl EntityContext {
    /// Create an empty context remembering at most `capacity` entities of
    /// each kind.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            datasets: Vec::new(),
            inquiries: Vec::new(),
        }
    }

    /// Datasets in recency order, most recent first.
    pub fn datasets(&self) -> &[DatasetRef] {
        &self.datasets
    }

    /// Inquiries in recency order, most recent first.
    pub fn inquiries(&self) -> &[InquiryRef] {
        &self.inquiries
    }

    /// Fold a tool-call record's result into the context.
    ///
    /// Knows the three result shapes the dispatcher produces: a search
    /// result array, a dataset object, and an inquiry object. Failed
    /// records carry no result and are ignored.
    pub fn absorb(&mut self, record: &ToolCallRecord) {
        if record.status == ToolCallStatus::Failed {
            return;
        }
        let Some(result) = &record.result else {
            return;
        };

        match result {
            Value::Array(items) => {
                // Search results arrive best-first; remember them so the
                // most relevant ends up most recent.
                for item in items.iter().rev() {
                    self.absorb_object(item);
                }
            }
            Value::Object(_) => self.absorb_object(result),
            _ => {}
        }
    }

    fn absorb_object(&mut self, value: &Value) {
        let Some(id) = value.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
        else {
            return;
        };

        // Inquiry objects carry a status; dataset objects carry a title.
        if let Some(status) = value.get("status").and_then(Value::as_str) {
            self.remember_inquiry(InquiryRef {
                id,
                status: status.to_string(),
            });
        } else if let Some(title) = value.get("title").and_then(Value::as_str) {
            let domain = value
                .get("domain")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            self.remember_dataset(DatasetRef {
                id,
                title: title.to_string(),
                domain,
            });
        }
    }

    fn remember_dataset(&mut self, entry: DatasetRef) {
        self.datasets.retain(|d| d.id != entry.id);
        self.datasets.insert(0, entry);
        self.datasets.truncate(self.capacity);
    }

    fn remember_inquiry(&mut self, entry: InquiryRef) {
        self.inquiries.retain(|i| i.id != entry.id);
        self.inquiries.insert(0, entry);
        self.inquiries.truncate(self.capacity);
    }

    /// Resolve a free-text reference ("the crypto one", "the second one")
    /// against remembered datasets.
    pub fn resolve_dataset_reference(&self, text: &str) -> Option<Uuid> {
        static ORDINAL: OnceLock<Regex> = OnceLock::new();
        static KEYWORD: OnceLock<Regex> = OnceLock::new();

        let lowered = text.to_lowercase();

        // Ordinals refer to the most recent result ordering.
        let ordinal = ORDINAL.get_or_init(|| {
            Regex::new(r"\bthe (first|second|third|fourth|fifth|1st|2nd|3rd|4th|5th) one\b")
                .expect("static regex")
        });
        if let Some(caps) = ordinal.captures(&lowered) {
            let index = match &caps[1] {
                "first" | "1st" => 0,
                "second" | "2nd" => 1,
                "third" | "3rd" => 2,
                "fourth" | "4th" => 3,
                _ => 4,
            };
            // Most-recent-first storage means search rank i sits at index i
            // only right after a search; fall back to recency order.
            return self.datasets.get(index).map(|d| d.id);
        }

        // "the <word> one" matches against title and domain.
        let keyword = KEYWORD
            .get_or_init(|| Regex::new(r"\bthe ([a-z0-9][a-z0-9 -]*?) one\b").expect("static regex"));
        if let Some(caps) = keyword.captures(&lowered) {
            let needle = caps[1].trim().to_string();
            return self
                .datasets
                .iter()
                .find(|d| {
                    d.title.to_lowercase().contains(&needle)
                        || d.domain.to_lowercase().contains(&needle)
                })
                .map(|d| d.id);
        }

        None
    }

    /// Render the context block included in the model's system prompt.
    pub fn render(&self) -> String {
        if self.datasets.is_empty() && self.inquiries.is_empty() {
            return String::new();
        }

        let mut out = String::from("Known entities from this conversation (most recent first):\n");
        for d in &self.datasets {
            out.push_str(&format!("- dataset {} \"{}\" ({})\n", d.id, d.title, d.domain));
        }
        for i in &self.inquiries {
            out.push_str(&format!("- inquiry {} (status: {})\n", i.id, i.status));
        }
        out
    }
}
