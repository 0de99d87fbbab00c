//! Turn orchestrator: the bounded interpret/execute loop.
//!
//! Each user message runs one pass: the model reads the conversation plus
//! tool schemas and either answers or requests tool calls; requested
//! calls execute through the dispatcher and their results loop back into
//! the model's context, at most `max_tool_rounds` times. Exhausting the
//! bound, a model failure, or a model timeout all force a partial-results
//! response, fatal to the turn but never to the conversation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use souk_core::config::ChatConfig;
use souk_core::types::{Conversation, Message, MessageRole, ToolCallRecord};
use souk_inquiry::InquiryStore;
use souk_storage::ConversationRepository;

use crate::affirmation::is_affirmative;
use crate::context::EntityContext;
use crate::error::ChatError;
use crate::llm::{CompletionRequest, LanguageModel, ModelMessage, ModelReply};
use crate::tools::{tool_schemas, ToolDispatcher, TurnContext};

/// How many trailing conversation messages are shown to the model.
const HISTORY_WINDOW: usize = 20;

/// Phases of one orchestration pass, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnPhase {
    Interpreting,
    Executing,
    Responding,
}

/// The result of one turn: the reply plus the structured tool-call log.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: Uuid,
    pub reply: String,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Interpret/execute rounds consumed.
    pub rounds_used: usize,
    /// True when the turn ended early (loop bound, model failure or
    /// timeout) and the reply explains partial results.
    pub exhausted: bool,
}

/// Per-conversation session state: the entity context behind an async
/// lock that also serializes turns within the conversation.
type SessionHandle = Arc<tokio::sync::Mutex<EntityContext>>;

/// The conversational agent.
pub struct AgentOrchestrator {
    llm: Box<dyn LanguageModel>,
    dispatcher: ToolDispatcher,
    repo: Arc<ConversationRepository>,
    inquiries: Arc<InquiryStore>,
    sessions: Mutex<HashMap<Uuid, SessionHandle>>,
    config: ChatConfig,
}

impl AgentOrchestrator {
    pub fn new(
        llm: Box<dyn LanguageModel>,
        dispatcher: ToolDispatcher,
        repo: Arc<ConversationRepository>,
        inquiries: Arc<InquiryStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            llm,
            dispatcher,
            repo,
            inquiries,
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Handle one user message and produce the turn outcome.
    ///
    /// At most one pass runs per conversation at a time; turns in
    /// different conversations proceed in parallel.
    pub async fn handle_message(
        &self,
        user_id: Uuid,
        conversation_id: Option<Uuid>,
        text: &str,
    ) -> Result<TurnOutcome, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.len() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        let conversation = self.resolve_conversation(user_id, conversation_id)?;
        let session = self.session_handle(conversation.id);
        // Holding the session lock for the whole pass is what guarantees
        // one active pass per conversation.
        let mut entities = session.lock().await;

        let user_affirmed = is_affirmative(text);
        self.repo
            .append_message(&Message::user(conversation.id, text))?;

        let mut messages = self.build_messages(conversation.id, &entities, text)?;
        let schemas = tool_schemas();
        let mut turn = TurnContext::new(conversation.id, user_id, user_affirmed);
        let mut records: Vec<ToolCallRecord> = Vec::new();

        let mut reply: Option<String> = None;
        let mut exhausted = false;
        let mut rounds_used = 0;

        while rounds_used < self.config.max_tool_rounds {
            rounds_used += 1;
            debug!(
                conversation = %conversation.id,
                round = rounds_used,
                phase = ?TurnPhase::Interpreting,
                "Orchestration round"
            );

            let request = CompletionRequest {
                messages: messages.clone(),
                tools: schemas.clone(),
            };
            let model_reply = match timeout(
                Duration::from_secs(self.config.model_timeout_secs),
                self.llm.complete(&request),
            )
            .await
            {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    warn!(model = self.llm.name(), error = %e, "Model call failed");
                    exhausted = true;
                    reply = Some(partial_reply(&records, "the language model was unavailable"));
                    break;
                }
                Err(_) => {
                    warn!(
                        model = self.llm.name(),
                        timeout_secs = self.config.model_timeout_secs,
                        "Model call timed out"
                    );
                    exhausted = true;
                    reply = Some(partial_reply(&records, "the language model timed out"));
                    break;
                }
            };

            match model_reply {
                ModelReply::Answer(text) => {
                    debug!(conversation = %conversation.id, phase = ?TurnPhase::Responding, "Turn complete");
                    reply = Some(text);
                    break;
                }
                ModelReply::ToolCalls(calls) => {
                    debug!(
                        conversation = %conversation.id,
                        phase = ?TurnPhase::Executing,
                        count = calls.len(),
                        "Executing tool calls"
                    );
                    for call in calls {
                        let record = match timeout(
                            Duration::from_secs(self.config.tool_timeout_secs),
                            self.dispatcher.dispatch(&mut turn, &call.name, &call.arguments),
                        )
                        .await
                        {
                            Ok(record) => record,
                            Err(_) => {
                                // A timed-out call leaves exactly one
                                // record, explicitly marked failed.
                                warn!(tool = %call.name, "Tool execution timed out");
                                ToolCallRecord::failed(
                                    call.name.clone(),
                                    call.arguments.clone(),
                                    "ERROR [timeout]: tool execution timed out".to_string(),
                                )
                            }
                        };

                        entities.absorb(&record);
                        messages.push(ModelMessage::tool(format!(
                            "{}: {}",
                            record.name,
                            record.result_text.as_deref().unwrap_or("(no output)")
                        )));
                        records.push(record);
                    }
                    // Refresh the context block before reinterpreting.
                    messages[0] = self.system_message(&entities, text);
                }
            }
        }

        let reply = reply.unwrap_or_else(|| {
            // Loop bound exceeded: respond with what we have rather than
            // failing silently. The next message starts a fresh pass.
            warn!(
                conversation = %conversation.id,
                rounds = rounds_used,
                "Orchestration loop bound exceeded"
            );
            exhausted = true;
            partial_reply(&records, "I reached my tool-call limit for this turn")
        });

        self.repo
            .append_message(&Message::assistant(conversation.id, &reply, records.clone()))?;

        Ok(TurnOutcome {
            conversation_id: conversation.id,
            reply,
            tool_calls: records,
            rounds_used,
            exhausted,
        })
    }

    /// All messages of a conversation in order.
    pub fn history(&self, conversation_id: Uuid) -> Result<Vec<Message>, ChatError> {
        self.repo
            .find_by_id(conversation_id)?
            .ok_or(ChatError::ConversationNotFound(conversation_id))?;
        Ok(self.repo.messages_for(conversation_id)?)
    }

    /// A user's visible conversations, newest first.
    pub fn conversations_for(&self, user_id: Uuid) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.repo.list_for_user(user_id)?)
    }

    /// Soft-delete a conversation: hidden from listings, retained on disk.
    pub fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), ChatError> {
        self.repo
            .find_by_id(conversation_id)?
            .ok_or(ChatError::ConversationNotFound(conversation_id))?;
        self.repo.soft_delete(conversation_id)?;
        Ok(())
    }

    /// Physically delete a conversation. Refused while any inquiry still
    /// references it.
    pub fn purge_conversation(&self, conversation_id: Uuid) -> Result<(), ChatError> {
        self.repo
            .find_by_id(conversation_id)?
            .ok_or(ChatError::ConversationNotFound(conversation_id))?;
        if self.inquiries.references_conversation(conversation_id) {
            return Err(ChatError::ConversationReferenced(conversation_id));
        }
        self.repo.purge(conversation_id)?;
        self.sessions
            .lock()
            .map_err(|e| ChatError::Storage(format!("session lock poisoned: {}", e)))?
            .remove(&conversation_id);
        Ok(())
    }

    /// Snapshot of the entity context carried by a conversation.
    pub async fn context_snapshot(&self, conversation_id: Uuid) -> Option<EntityContext> {
        let handle = {
            let sessions = self.sessions.lock().ok()?;
            sessions.get(&conversation_id).cloned()?
        };
        let entities = handle.lock().await;
        Some(entities.clone())
    }

    // -- Private helpers --

    fn resolve_conversation(
        &self,
        user_id: Uuid,
        requested: Option<Uuid>,
    ) -> Result<Conversation, ChatError> {
        if let Some(id) = requested {
            if let Some(conversation) = self.repo.find_by_id(id)? {
                if !conversation.deleted && conversation.user_id == user_id {
                    return Ok(conversation);
                }
            }
        }
        Ok(self.repo.create(user_id)?)
    }

    fn session_handle(&self, conversation_id: Uuid) -> SessionHandle {
        let mut sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(sessions.entry(conversation_id).or_insert_with(|| {
            Arc::new(tokio::sync::Mutex::new(EntityContext::new(
                self.config.context_entities,
            )))
        }))
    }

    fn build_messages(
        &self,
        conversation_id: Uuid,
        entities: &EntityContext,
        user_text: &str,
    ) -> Result<Vec<ModelMessage>, ChatError> {
        let mut messages = vec![self.system_message(entities, user_text)];

        let history = self.repo.messages_for(conversation_id)?;
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        for msg in &history[start..] {
            match msg.role {
                MessageRole::User => messages.push(ModelMessage::user(&msg.content)),
                MessageRole::Assistant => messages.push(ModelMessage::assistant(&msg.content)),
            }
        }
        Ok(messages)
    }

    fn system_message(&self, entities: &EntityContext, user_text: &str) -> ModelMessage {
        let mut prompt = String::from(
            "You are the Souk data-marketplace assistant. You help buyers find \
             datasets and contact vendors through inquiries. Use the provided \
             tools; create inquiry drafts freely, but never submit one unless \
             the user has just explicitly confirmed.",
        );

        let context_block = entities.render();
        if !context_block.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&context_block);
        }
        // Resolve follow-up references ("the crypto one") against the
        // remembered entities so the model need not re-query.
        if let Some(dataset_id) = entities.resolve_dataset_reference(user_text) {
            prompt.push_str(&format!(
                "\nThe user's latest message likely refers to dataset {}.",
                dataset_id
            ));
        }
        ModelMessage::system(prompt)
    }
}

/// Compose the partial-results reply used when a turn ends early.
fn partial_reply(records: &[ToolCallRecord], reason: &str) -> String {
    if records.is_empty() {
        format!("I couldn't finish this request: {}. Please try again.", reason)
    } else {
        let summaries: Vec<&str> = records
            .iter()
            .filter_map(|r| r.result_text.as_deref())
            .collect();
        format!(
            "I couldn't fully finish this request: {}. Partial results from {} tool call(s): {}",
            reason,
            records.len(),
            summaries.join("; ")
        )
    }
}
