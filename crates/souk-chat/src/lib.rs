//! Conversational agent for the Souk marketplace.
//!
//! Drives the bounded interpret/execute loop against a language model:
//! the model selects tools, the dispatcher executes them against the
//! dataset catalog and the inquiry store, and results fold back into the
//! conversation context. Irreversible inquiry submission sits behind a
//! structural confirmation gate keyed to the literal prior user message.

pub mod affirmation;
pub mod context;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod tools;

pub use affirmation::is_affirmative;
pub use context::EntityContext;
pub use error::ChatError;
pub use llm::{
    CompletionRequest, LanguageModel, LlmError, ModelMessage, ModelReply, ModelRole, RuleModel,
    ScriptedModel, ToolInvocation, ToolSchema,
};
pub use orchestrator::{AgentOrchestrator, TurnOutcome};
pub use tools::{ToolDispatcher, ToolFailure, ToolFailureKind, TurnContext};
