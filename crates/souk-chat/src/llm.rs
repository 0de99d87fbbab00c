//! Language-model boundary.
//!
//! The completion capability is opaque to this system: the orchestrator
//! hands over conversation messages plus tool schemas and receives either
//! tool invocations or a final answer. Real providers implement
//! [`LanguageModel`] out of crate; bundled here are `ScriptedModel` (a
//! deterministic queue for tests) and `RuleModel` (a keyword planner used
//! as the offline default in the composition root).

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors from a language-model call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Failed to parse model output: {0}")]
    Parse(String),
    #[error("Model call timed out")]
    Timeout,
}

/// Role of a message shown to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::System => write!(f, "system"),
            ModelRole::User => write!(f, "user"),
            ModelRole::Assistant => write!(f, "assistant"),
            ModelRole::Tool => write!(f, "tool"),
        }
    }
}

/// One message in the completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: String,
}

impl ModelMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Tool,
            content: content.into(),
        }
    }
}

/// Schema describing one callable tool to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON-schema-shaped parameter description.
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// The model's reply to a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelReply {
    /// The model wants one or more tools executed.
    ToolCalls(Vec<ToolInvocation>),
    /// The model is done and answers the user directly.
    Answer(String),
}

/// A completion request: conversation messages plus available tools.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolSchema>,
}

impl CompletionRequest {
    /// The content of the most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ModelRole::User)
            .map(|m| m.content.as_str())
    }

    /// Tool messages that follow the most recent user message, i.e. the
    /// results produced so far in the current turn.
    pub fn current_turn_tool_messages(&self) -> Vec<&ModelMessage> {
        let last_user = self
            .messages
            .iter()
            .rposition(|m| m.role == ModelRole::User)
            .unwrap_or(0);
        self.messages[last_user..]
            .iter()
            .filter(|m| m.role == ModelRole::Tool)
            .collect()
    }
}

/// Opaque completion capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce the next reply for the given request.
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelReply, LlmError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Shared handles delegate, so callers can keep a handle to a model they
/// have already boxed into the orchestrator (tests script replies this way).
#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for std::sync::Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelReply, LlmError> {
        (**self).complete(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// ScriptedModel - deterministic reply queue
// ---------------------------------------------------------------------------

/// Model double that replays a scripted sequence of replies.
///
/// Each `complete` call pops the next reply; an exhausted script is a
/// provider error, which keeps tests honest about how many rounds they
/// expect the orchestrator to run.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply; builder-style for test setup.
    pub fn then(self, reply: ModelReply) -> Self {
        self.push(reply);
        self
    }

    /// Queue a reply.
    pub fn push(&self, reply: ModelReply) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    /// Number of replies still queued.
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _request: &CompletionRequest) -> Result<ModelReply, LlmError> {
        let mut q = self
            .replies
            .lock()
            .map_err(|e| LlmError::Provider(format!("script lock poisoned: {}", e)))?;
        q.pop_front()
            .ok_or_else(|| LlmError::Provider("no scripted reply remaining".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// RuleModel - offline keyword planner
// ---------------------------------------------------------------------------

/// Keyword planner used when no real provider is configured.
///
/// Routes obvious search phrasing to `search_datasets` and summarizes
/// tool results on the following round. It never plans an inquiry
/// submission on its own; irreversible actions stay behind explicit
/// model-independent gating anyway.
pub struct RuleModel {
    search_intent: Regex,
}

impl RuleModel {
    pub fn new() -> Self {
        Self {
            // Verbs and phrasings that read as a catalog search request.
            search_intent: Regex::new(
                r"(?i)\b(find|search|looking for|show me|need|browse|data (?:on|about|for))\b",
            )
            .expect("static regex"),
        }
    }
}

impl Default for RuleModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for RuleModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelReply, LlmError> {
        let tool_results = request.current_turn_tool_messages();
        if !tool_results.is_empty() {
            let mut summary = String::from("Here is what I found:\n");
            for msg in tool_results {
                summary.push_str(&msg.content);
                summary.push('\n');
            }
            return Ok(ModelReply::Answer(summary.trim_end().to_string()));
        }

        let Some(user_text) = request.last_user_message() else {
            return Ok(ModelReply::Answer(
                "Tell me what kind of data you are looking for.".to_string(),
            ));
        };

        if self.search_intent.is_match(user_text)
            && request.tools.iter().any(|t| t.name == "search_datasets")
        {
            return Ok(ModelReply::ToolCalls(vec![ToolInvocation::new(
                "search_datasets",
                serde_json::json!({ "query": user_text }),
            )]));
        }

        Ok(ModelReply::Answer(
            "I can search the marketplace catalog for you. Describe the data you need."
                .to_string(),
        ))
    }

    fn name(&self) -> &str {
        "rule-based"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(messages: Vec<ModelMessage>) -> CompletionRequest {
        CompletionRequest {
            messages,
            tools: vec![ToolSchema {
                name: "search_datasets".to_string(),
                description: "search".to_string(),
                parameters: serde_json::json!({}),
            }],
        }
    }

    // ---- CompletionRequest helpers ----

    #[test]
    fn test_last_user_message() {
        let req = request(vec![
            ModelMessage::system("sys"),
            ModelMessage::user("first"),
            ModelMessage::assistant("reply"),
            ModelMessage::user("second"),
        ]);
        assert_eq!(req.last_user_message(), Some("second"));
    }

    #[test]
    fn test_current_turn_tool_messages_only_after_last_user() {
        let req = request(vec![
            ModelMessage::user("first"),
            ModelMessage::tool("stale result"),
            ModelMessage::user("second"),
            ModelMessage::tool("fresh result"),
        ]);
        let tools = req.current_turn_tool_messages();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].content, "fresh result");
    }

    // ---- ScriptedModel ----

    #[tokio::test]
    async fn test_scripted_model_pops_in_order() {
        let model = ScriptedModel::new()
            .then(ModelReply::Answer("one".to_string()))
            .then(ModelReply::Answer("two".to_string()));

        let req = request(vec![ModelMessage::user("hi")]);
        assert_eq!(
            model.complete(&req).await.unwrap(),
            ModelReply::Answer("one".to_string())
        );
        assert_eq!(
            model.complete(&req).await.unwrap(),
            ModelReply::Answer("two".to_string())
        );
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn test_scripted_model_exhaustion_is_error() {
        let model = ScriptedModel::new();
        let req = request(vec![ModelMessage::user("hi")]);
        assert!(model.complete(&req).await.is_err());
    }

    // ---- RuleModel ----

    #[tokio::test]
    async fn test_rule_model_routes_search_phrasing_to_tool() {
        let model = RuleModel::new();
        let req = request(vec![ModelMessage::user(
            "I'm looking for weather station data",
        )]);
        match model.complete(&req).await.unwrap() {
            ModelReply::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "search_datasets");
                assert!(calls[0].arguments["query"]
                    .as_str()
                    .unwrap()
                    .contains("weather station"));
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rule_model_answers_after_tool_results() {
        let model = RuleModel::new();
        let req = request(vec![
            ModelMessage::user("find ship data"),
            ModelMessage::tool("2 datasets matched"),
        ]);
        match model.complete(&req).await.unwrap() {
            ModelReply::Answer(text) => assert!(text.contains("2 datasets matched")),
            other => panic!("expected answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rule_model_plain_chatter_gets_direct_answer() {
        let model = RuleModel::new();
        let req = request(vec![ModelMessage::user("hello there")]);
        assert!(matches!(
            model.complete(&req).await.unwrap(),
            ModelReply::Answer(_)
        ));
    }

    #[tokio::test]
    async fn test_rule_model_never_plans_submission() {
        let model = RuleModel::new();
        let req = request(vec![ModelMessage::user("yes, submit it")]);
        match model.complete(&req).await.unwrap() {
            ModelReply::ToolCalls(calls) => {
                assert!(calls.iter().all(|c| c.name != "submit_inquiry"));
            }
            ModelReply::Answer(_) => {}
        }
    }
}
