//! Tool registry and dispatcher.
//!
//! The callable surface is a closed, compile-time tagged union: each tool
//! has a typed argument struct deserialized from the model's JSON. The
//! dispatcher never returns an error to the orchestration loop; every
//! failure becomes a structured, explicitly-marked record, and it
//! deduplicates identical calls within a turn so a model re-issuing the
//! same invocation cannot double-execute a side effect.
//!
//! The confirmation gate for inquiry submission is structural, not
//! prompt-text: `submit_inquiry` executes only when the arguments carry
//! `confirmed: true`, the turn was opened by an affirmative user message,
//! and the target draft was not created in this same turn.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use souk_core::error::SoukError;
use souk_core::types::{PricingModel, ToolCallRecord};
use souk_inquiry::{InquiryError, InquiryStore};
use souk_vector::{DatasetCatalog, SearchFilters, SearchRequest};

use crate::llm::ToolSchema;

// =============================================================================
// Failure taxonomy
// =============================================================================

/// Classification of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFailureKind {
    /// Malformed arguments; surfaced to the model as retryable.
    InvalidArguments,
    /// Workflow violation; a user-visible rejection, never coerced.
    IllegalTransition,
    /// Referenced entity does not exist.
    NotFound,
    /// The confirmation gate blocked an irreversible action.
    ConfirmationRequired,
    /// The vendor response payload was missing or empty.
    EmptyResponse,
    /// The embedding backend was unavailable for this call.
    EmbeddingUnavailable,
    /// Internal failure (storage, lock).
    Internal,
}

/// A structured tool failure: kind plus a message the model can read.
#[derive(Debug, Clone)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub message: String,
}

impl ToolFailure {
    fn new(kind: ToolFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::new(ToolFailureKind::InvalidArguments, message)
    }

    /// True if the model should retry with corrected arguments.
    pub fn retryable(&self) -> bool {
        matches!(self.kind, ToolFailureKind::InvalidArguments)
    }

    /// Render the failure text recorded and shown to the model.
    fn render(&self) -> String {
        let tag = match self.kind {
            ToolFailureKind::InvalidArguments => "invalid_arguments",
            ToolFailureKind::IllegalTransition => "illegal_transition",
            ToolFailureKind::NotFound => "not_found",
            ToolFailureKind::ConfirmationRequired => "confirmation_required",
            ToolFailureKind::EmptyResponse => "empty_response",
            ToolFailureKind::EmbeddingUnavailable => "embedding_unavailable",
            ToolFailureKind::Internal => "internal",
        };
        format!("ERROR [{}]: {}", tag, self.message)
    }
}

impl From<InquiryError> for ToolFailure {
    fn from(err: InquiryError) -> Self {
        let kind = match &err {
            InquiryError::NotFound(_) => ToolFailureKind::NotFound,
            InquiryError::IllegalTransition { .. } => ToolFailureKind::IllegalTransition,
            InquiryError::PayloadFrozen(_) => ToolFailureKind::IllegalTransition,
            InquiryError::EmptyResponse => ToolFailureKind::EmptyResponse,
            InquiryError::Store(_) => ToolFailureKind::Internal,
        };
        ToolFailure::new(kind, err.to_string())
    }
}

impl From<SoukError> for ToolFailure {
    fn from(err: SoukError) -> Self {
        let kind = match &err {
            SoukError::Embedding(_) => ToolFailureKind::EmbeddingUnavailable,
            _ => ToolFailureKind::Internal,
        };
        ToolFailure::new(kind, err.to_string())
    }
}

// =============================================================================
// Typed tool arguments
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SearchDatasetsArgs {
    pub query: String,
    pub top_k: Option<usize>,
    pub domain: Option<String>,
    pub pricing: Option<PricingModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetDatasetArgs {
    pub dataset_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInquiryDraftArgs {
    pub dataset_id: Uuid,
    /// Free-form buyer payload (use case, budget, timeline, notes).
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitInquiryArgs {
    pub inquiry_id: Uuid,
    /// Must be true, and may only be set by the orchestrator when the
    /// preceding user message passed the affirmation check.
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetInquiryArgs {
    pub inquiry_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListVendorInquiriesArgs {
    pub vendor_id: Uuid,
}

/// The closed set of tools the model may invoke.
#[derive(Debug, Clone)]
pub enum ToolRequest {
    SearchDatasets(SearchDatasetsArgs),
    GetDataset(GetDatasetArgs),
    CreateInquiryDraft(CreateInquiryDraftArgs),
    SubmitInquiry(SubmitInquiryArgs),
    GetInquiry(GetInquiryArgs),
    ListVendorInquiries(ListVendorInquiriesArgs),
}

impl ToolRequest {
    /// Parse a named invocation into a typed request.
    ///
    /// Unknown names and malformed argument sets fail fast with
    /// `InvalidArguments`; execution never starts on unvalidated input.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolFailure> {
        fn args<T: serde::de::DeserializeOwned>(
            name: &str,
            arguments: &Value,
        ) -> Result<T, ToolFailure> {
            serde_json::from_value(arguments.clone())
                .map_err(|e| ToolFailure::invalid(format!("{} arguments: {}", name, e)))
        }

        match name {
            "search_datasets" => Ok(Self::SearchDatasets(args(name, arguments)?)),
            "get_dataset" => Ok(Self::GetDataset(args(name, arguments)?)),
            "create_inquiry_draft" => Ok(Self::CreateInquiryDraft(args(name, arguments)?)),
            "submit_inquiry" => Ok(Self::SubmitInquiry(args(name, arguments)?)),
            "get_inquiry" => Ok(Self::GetInquiry(args(name, arguments)?)),
            "list_vendor_inquiries" => Ok(Self::ListVendorInquiries(args(name, arguments)?)),
            other => Err(ToolFailure::invalid(format!("unknown tool: {}", other))),
        }
    }
}

/// Schemas for every registered tool, handed to the model each round.
/// The registry is fixed at compile time and read-only thereafter.
pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: "search_datasets".to_string(),
            description: "Search the dataset catalog by meaning. Optional filters: domain, \
                          pricing (free|one_time|subscription|usage_based), top_k."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "top_k": {"type": "integer"},
                    "domain": {"type": "string"},
                    "pricing": {"type": "string"}
                },
                "required": ["query"]
            }),
        },
        ToolSchema {
            name: "get_dataset".to_string(),
            description: "Fetch full details of one dataset by id.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"dataset_id": {"type": "string"}},
                "required": ["dataset_id"]
            }),
        },
        ToolSchema {
            name: "create_inquiry_draft".to_string(),
            description: "Create a draft inquiry to a dataset's vendor. Cheap and \
                          reversible; nothing is sent until the user confirms submission."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "dataset_id": {"type": "string"},
                    "payload": {"type": "object"}
                },
                "required": ["dataset_id"]
            }),
        },
        ToolSchema {
            name: "submit_inquiry".to_string(),
            description: "Submit a draft inquiry to the vendor. Irreversible. Requires \
                          confirmed=true, which is only honored right after the user \
                          explicitly said yes."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "inquiry_id": {"type": "string"},
                    "confirmed": {"type": "boolean"}
                },
                "required": ["inquiry_id", "confirmed"]
            }),
        },
        ToolSchema {
            name: "get_inquiry".to_string(),
            description: "Fetch an inquiry's current state by id.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"inquiry_id": {"type": "string"}},
                "required": ["inquiry_id"]
            }),
        },
        ToolSchema {
            name: "list_vendor_inquiries".to_string(),
            description: "List inquiries awaiting a vendor's attention.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"vendor_id": {"type": "string"}},
                "required": ["vendor_id"]
            }),
        },
    ]
}

// =============================================================================
// Turn context
// =============================================================================

/// Mutable per-turn state threaded through the orchestration loop.
///
/// Never a process-wide value: each turn builds its own.
#[derive(Debug)]
pub struct TurnContext {
    pub conversation_id: Uuid,
    pub buyer_id: Uuid,
    /// Whether the user message that opened this turn passed the
    /// affirmation check. Set once at turn start, read by the gate.
    pub user_affirmed: bool,
    /// Drafts created in this turn; submitting them in the same turn is
    /// refused so draft+submit can never chain without an intervening
    /// user confirmation.
    drafts_created: HashSet<Uuid>,
    /// Replay cache keyed by (tool, canonical arguments).
    executed: HashMap<(String, String), (Value, String)>,
}

impl TurnContext {
    pub fn new(conversation_id: Uuid, buyer_id: Uuid, user_affirmed: bool) -> Self {
        Self {
            conversation_id,
            buyer_id,
            user_affirmed,
            drafts_created: HashSet::new(),
            executed: HashMap::new(),
        }
    }
}

/// Canonicalize arguments for deduplication: object keys are sorted
/// recursively so key order cannot defeat the replay cache.
fn canonicalize(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<_, _> = map.iter().map(|(k, v)| (k.clone(), sort(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Executes tool requests against the catalog and the inquiry store.
pub struct ToolDispatcher {
    catalog: Arc<DatasetCatalog>,
    inquiries: Arc<InquiryStore>,
}

impl ToolDispatcher {
    pub fn new(catalog: Arc<DatasetCatalog>, inquiries: Arc<InquiryStore>) -> Self {
        Self { catalog, inquiries }
    }

    /// Execute one invocation and return its record.
    ///
    /// This method never fails: validation errors, workflow rejections,
    /// and internal faults all come back as records explicitly marked
    /// failed, with text the model can reason about.
    pub async fn dispatch(&self, ctx: &mut TurnContext, name: &str, arguments: &Value) -> ToolCallRecord {
        let key = (name.to_string(), canonicalize(arguments));
        if let Some((result, summary)) = ctx.executed.get(&key) {
            debug!(tool = name, "Replaying deduplicated tool call");
            return ToolCallRecord::ok(name, arguments.clone(), result.clone(), summary.clone());
        }

        let request = match ToolRequest::parse(name, arguments) {
            Ok(req) => req,
            Err(failure) => {
                return ToolCallRecord::failed(name, arguments.clone(), failure.render());
            }
        };

        match self.execute(ctx, request).await {
            Ok((result, summary)) => {
                ctx.executed.insert(key, (result.clone(), summary.clone()));
                ToolCallRecord::ok(name, arguments.clone(), result, summary)
            }
            Err(failure) => ToolCallRecord::failed(name, arguments.clone(), failure.render()),
        }
    }

    async fn execute(
        &self,
        ctx: &mut TurnContext,
        request: ToolRequest,
    ) -> Result<(Value, String), ToolFailure> {
        match request {
            ToolRequest::SearchDatasets(args) => self.search_datasets(args).await,
            ToolRequest::GetDataset(args) => self.get_dataset(args),
            ToolRequest::CreateInquiryDraft(args) => self.create_inquiry_draft(ctx, args),
            ToolRequest::SubmitInquiry(args) => self.submit_inquiry(ctx, args),
            ToolRequest::GetInquiry(args) => self.get_inquiry(args),
            ToolRequest::ListVendorInquiries(args) => self.list_vendor_inquiries(args),
        }
    }

    async fn search_datasets(
        &self,
        args: SearchDatasetsArgs,
    ) -> Result<(Value, String), ToolFailure> {
        if args.query.trim().is_empty() {
            return Err(ToolFailure::invalid("query must not be empty"));
        }

        let request = SearchRequest {
            query: args.query,
            top_k: args.top_k,
            filters: SearchFilters {
                domain: args.domain,
                pricing: args.pricing,
                visibility: None,
            },
            caller_vendor: None,
        };
        let matches = self.catalog.search(&request).await?;

        let summary = if matches.is_empty() {
            "0 datasets matched".to_string()
        } else {
            let titles: Vec<String> = matches
                .iter()
                .map(|m| format!("{} ({})", m.dataset.title, m.dataset.domain))
                .collect();
            format!("{} datasets matched: {}", matches.len(), titles.join("; "))
        };
        Ok((serde_json::to_value(&matches).map_err(SoukError::from)?, summary))
    }

    fn get_dataset(&self, args: GetDatasetArgs) -> Result<(Value, String), ToolFailure> {
        let dataset = self.catalog.get(args.dataset_id).ok_or_else(|| {
            ToolFailure::new(
                ToolFailureKind::NotFound,
                format!("dataset not found: {}", args.dataset_id),
            )
        })?;
        let summary = format!("{}: {}", dataset.title, dataset.description);
        Ok((serde_json::to_value(&dataset).map_err(SoukError::from)?, summary))
    }

    fn create_inquiry_draft(
        &self,
        ctx: &mut TurnContext,
        args: CreateInquiryDraftArgs,
    ) -> Result<(Value, String), ToolFailure> {
        let dataset = self.catalog.get(args.dataset_id).ok_or_else(|| {
            ToolFailure::new(
                ToolFailureKind::NotFound,
                format!("dataset not found: {}", args.dataset_id),
            )
        })?;

        let payload = if args.payload.is_null() {
            json!({})
        } else {
            args.payload
        };
        let inquiry = self.inquiries.create_draft(
            ctx.buyer_id,
            dataset.vendor_id,
            dataset.id,
            Some(ctx.conversation_id),
            payload,
        )?;
        ctx.drafts_created.insert(inquiry.id);

        let summary = format!(
            "Draft inquiry {} created for \"{}\" (not yet sent)",
            inquiry.id, dataset.title
        );
        Ok((serde_json::to_value(&inquiry).map_err(SoukError::from)?, summary))
    }

    fn submit_inquiry(
        &self,
        ctx: &mut TurnContext,
        args: SubmitInquiryArgs,
    ) -> Result<(Value, String), ToolFailure> {
        // Structural confirmation gate: all three checks must pass before
        // the irreversible transition is even attempted.
        if !args.confirmed {
            return Err(ToolFailure::new(
                ToolFailureKind::ConfirmationRequired,
                "submission requires confirmed=true after an explicit user go-ahead",
            ));
        }
        if !ctx.user_affirmed {
            return Err(ToolFailure::new(
                ToolFailureKind::ConfirmationRequired,
                "the user has not given an explicit go-ahead in their last message",
            ));
        }
        if ctx.drafts_created.contains(&args.inquiry_id) {
            return Err(ToolFailure::new(
                ToolFailureKind::ConfirmationRequired,
                "this draft was created in the current turn; ask the user to confirm first",
            ));
        }

        let inquiry = self.inquiries.submit(args.inquiry_id)?;
        let summary = format!("Inquiry {} submitted to the vendor", inquiry.id);
        Ok((serde_json::to_value(&inquiry).map_err(SoukError::from)?, summary))
    }

    fn get_inquiry(&self, args: GetInquiryArgs) -> Result<(Value, String), ToolFailure> {
        let inquiry = self.inquiries.get(args.inquiry_id)?;
        let summary = format!("Inquiry {} is {}", inquiry.id, inquiry.status);
        Ok((serde_json::to_value(&inquiry).map_err(SoukError::from)?, summary))
    }

    fn list_vendor_inquiries(
        &self,
        args: ListVendorInquiriesArgs,
    ) -> Result<(Value, String), ToolFailure> {
        let pending = self.inquiries.list_pending_for_vendor(args.vendor_id)?;
        let summary = format!("{} inquiries awaiting vendor attention", pending.len());
        Ok((serde_json::to_value(&pending).map_err(SoukError::from)?, summary))
    }
}
