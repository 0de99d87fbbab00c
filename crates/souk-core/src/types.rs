//! Core domain types for the data marketplace.
//!
//! Datasets, conversations, messages, and the tool-call audit record
//! shared between the catalog, the agent, and the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// How a dataset is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    Free,
    OneTime,
    Subscription,
    UsageBased,
}

impl fmt::Display for PricingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingModel::Free => write!(f, "free"),
            PricingModel::OneTime => write!(f, "one_time"),
            PricingModel::Subscription => write!(f, "subscription"),
            PricingModel::UsageBased => write!(f, "usage_based"),
        }
    }
}

impl std::str::FromStr for PricingModel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PricingModel::Free),
            "one_time" => Ok(PricingModel::OneTime),
            "subscription" => Ok(PricingModel::Subscription),
            "usage_based" => Ok(PricingModel::UsageBased),
            _ => Err(format!("Unknown pricing model: {}", s)),
        }
    }
}

/// Whether a dataset is discoverable by all buyers or only by its vendor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            _ => Err(format!("Unknown visibility: {}", s)),
        }
    }
}

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(format!("Unknown message role: {}", s)),
        }
    }
}

/// Outcome marker for a tool-call record.
///
/// A timed-out or failed call is recorded explicitly as `Failed` rather
/// than being left as a partial record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Ok,
    Failed,
}

// =============================================================================
// Dataset
// =============================================================================

/// A vendor-owned dataset listing in the marketplace catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub title: String,
    pub description: String,
    /// Business domain, e.g. "Finance" or "Healthcare". Free-form but
    /// filterable by exact (case-insensitive) match.
    pub domain: String,
    pub pricing: PricingModel,
    pub topics: Vec<String>,
    pub temporal_coverage: Option<String>,
    pub geographic_coverage: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dataset {
    /// Create a public dataset with the given metadata, stamped now.
    pub fn new(
        vendor_id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        domain: impl Into<String>,
        pricing: PricingModel,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            vendor_id,
            title: title.into(),
            description: description.into(),
            domain: domain.into(),
            pricing,
            topics: Vec::new(),
            temporal_coverage: None,
            geographic_coverage: None,
            visibility: Visibility::Public,
            created_at: now,
            updated_at: now,
        }
    }

    /// Render the canonical text the embedding is derived from.
    ///
    /// Every metadata field that should influence semantic matching feeds
    /// this rendering; the catalog re-embeds whenever the dataset is
    /// upserted, so the embedding always reflects the current rendering.
    pub fn canonical_text(&self) -> String {
        let mut parts = vec![
            self.title.clone(),
            self.description.clone(),
            format!("domain: {}", self.domain),
        ];
        if !self.topics.is_empty() {
            parts.push(format!("topics: {}", self.topics.join(", ")));
        }
        if let Some(ref temporal) = self.temporal_coverage {
            parts.push(format!("coverage: {}", temporal));
        }
        if let Some(ref geo) = self.geographic_coverage {
            parts.push(format!("region: {}", geo));
        }
        parts.join("\n")
    }

    /// Project the dataset down to its listing summary.
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            id: self.id,
            vendor_id: self.vendor_id,
            title: self.title.clone(),
            domain: self.domain.clone(),
            pricing: self.pricing,
            updated_at: self.updated_at,
        }
    }
}

/// Compact dataset view returned from search and listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub title: String,
    pub domain: String,
    pub pricing: PricingModel,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Conversations and messages
// =============================================================================

/// A buyer's conversation with the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker; soft-deleted conversations are hidden from
    /// listings but retained while inquiries reference them.
    #[serde(default)]
    pub deleted: bool,
}

/// A single message in a conversation.
///
/// Assistant messages may carry the ordered tool-call records produced
/// while composing the reply. Records are written once with the message
/// and never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a user message.
    pub fn user(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::User,
            content: content.into(),
            tool_calls: None,
            created_at: Utc::now(),
        }
    }

    /// Create an assistant message with its tool-call log.
    pub fn assistant(
        conversation_id: Uuid,
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Tool-call audit record
// =============================================================================

/// Immutable record of one tool invocation, persisted with the message
/// that triggered it and returned to the caller alongside the reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Value,
    pub result: Option<Value>,
    #[serde(rename = "resultText")]
    pub result_text: Option<String>,
    pub status: ToolCallStatus,
}

impl ToolCallRecord {
    /// Record a successful call.
    pub fn ok(name: impl Into<String>, arguments: Value, result: Value, summary: String) -> Self {
        Self {
            name: name.into(),
            arguments,
            result: Some(result),
            result_text: Some(summary),
            status: ToolCallStatus::Ok,
        }
    }

    /// Record a failed call. The result is null; the text carries the
    /// failure description shown to the model and the user.
    pub fn failed(name: impl Into<String>, arguments: Value, reason: String) -> Self {
        Self {
            name: name.into(),
            arguments,
            result: None,
            result_text: Some(reason),
            status: ToolCallStatus::Failed,
        }
    }
}
