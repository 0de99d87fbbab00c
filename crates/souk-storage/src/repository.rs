//! Repository for conversations and their messages.
//!
//! Messages are append-only: each one is assigned the next sequence
//! number inside the write transaction and there is no update statement
//! anywhere in this module, so persisted tool-call records cannot be
//! rewritten after the fact.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use souk_core::error::SoukError;
use souk_core::types::{Conversation, Message, MessageRole, ToolCallRecord};

use crate::db::Database;

/// Repository over the conversations and messages tables.
pub struct ConversationRepository {
    db: Arc<Database>,
}

impl ConversationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new conversation for a user.
    pub fn create(&self, user_id: Uuid) -> Result<Conversation, SoukError> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
            deleted: false,
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, created_at, deleted)
                 VALUES (?1, ?2, ?3, 0)",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.user_id.to_string(),
                    conversation.created_at.timestamp(),
                ],
            )
            .map_err(|e| SoukError::Storage(format!("failed to create conversation: {}", e)))?;
            Ok(())
        })?;
        Ok(conversation)
    }

    /// Find a conversation by id, soft-deleted rows included.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, SoukError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, created_at, deleted
                 FROM conversations WHERE id = ?1",
                rusqlite::params![id.to_string()],
                row_to_conversation,
            )
            .optional()
            .map_err(|e| SoukError::Storage(e.to_string()))?
            .transpose()
        })
    }

    /// List a user's conversations, newest first, excluding soft-deleted.
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, SoukError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, created_at, deleted
                     FROM conversations
                     WHERE user_id = ?1 AND deleted = 0
                     ORDER BY created_at DESC, id",
                )
                .map_err(|e| SoukError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string()], row_to_conversation)
                .map_err(|e| SoukError::Storage(e.to_string()))?;

            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row.map_err(|e| SoukError::Storage(e.to_string()))??);
            }
            Ok(conversations)
        })
    }

    /// Soft-delete a conversation. The row and its messages stay on disk;
    /// the conversation simply disappears from listings.
    pub fn soft_delete(&self, id: Uuid) -> Result<(), SoukError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE conversations SET deleted = 1 WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                )
                .map_err(|e| SoukError::Storage(e.to_string()))?;
            if changed == 0 {
                return Err(SoukError::Storage(format!("conversation not found: {}", id)));
            }
            Ok(())
        })
    }

    /// Physically delete a conversation and its messages.
    ///
    /// Callers must first verify that no inquiry references the
    /// conversation; the chat service performs that check against the
    /// inquiry store before invoking this.
    pub fn purge(&self, id: Uuid) -> Result<(), SoukError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM messages WHERE conversation_id = ?1",
                rusqlite::params![id.to_string()],
            )
            .map_err(|e| SoukError::Storage(e.to_string()))?;
            conn.execute(
                "DELETE FROM conversations WHERE id = ?1",
                rusqlite::params![id.to_string()],
            )
            .map_err(|e| SoukError::Storage(e.to_string()))?;
            Ok(())
        })
    }

    /// Append a message to its conversation.
    ///
    /// The sequence number is assigned inside the connection lock, so
    /// concurrent appends to one conversation cannot collide.
    pub fn append_message(&self, message: &Message) -> Result<(), SoukError> {
        let tool_calls_json = match &message.tool_calls {
            Some(records) => Some(serde_json::to_string(records)?),
            None => None,
        };

        self.db.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM conversations WHERE id = ?1",
                    rusqlite::params![message.conversation_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| SoukError::Storage(e.to_string()))?;
            if exists.is_none() {
                return Err(SoukError::Storage(format!(
                    "conversation not found: {}",
                    message.conversation_id
                )));
            }

            let next_seq: i64 = conn
                .query_row(
                    "SELECT COALESCE(MAX(seq), -1) + 1 FROM messages WHERE conversation_id = ?1",
                    rusqlite::params![message.conversation_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| SoukError::Storage(e.to_string()))?;

            conn.execute(
                "INSERT INTO messages (id, conversation_id, seq, role, content, tool_calls, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    message.id.to_string(),
                    message.conversation_id.to_string(),
                    next_seq,
                    message.role.to_string(),
                    message.content,
                    tool_calls_json,
                    message.created_at.timestamp(),
                ],
            )
            .map_err(|e| SoukError::Storage(format!("failed to append message: {}", e)))?;
            Ok(())
        })
    }

    /// All messages of a conversation in insertion order.
    pub fn messages_for(&self, conversation_id: Uuid) -> Result<Vec<Message>, SoukError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, conversation_id, role, content, tool_calls, created_at
                     FROM messages WHERE conversation_id = ?1
                     ORDER BY seq",
                )
                .map_err(|e| SoukError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![conversation_id.to_string()], row_to_message)
                .map_err(|e| SoukError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row.map_err(|e| SoukError::Storage(e.to_string()))??);
            }
            Ok(messages)
        })
    }
}

fn parse_uuid(s: String) -> Result<Uuid, SoukError> {
    Uuid::parse_str(&s).map_err(|e| SoukError::Storage(format!("bad uuid in row: {}", e)))
}

fn epoch_to_datetime(epoch: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch, 0).single().unwrap_or_default()
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Conversation, SoukError>> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let created_at: i64 = row.get(2)?;
    let deleted: i64 = row.get(3)?;
    Ok((|| {
        Ok(Conversation {
            id: parse_uuid(id)?,
            user_id: parse_uuid(user_id)?,
            created_at: epoch_to_datetime(created_at),
            deleted: deleted != 0,
        })
    })())
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Message, SoukError>> {
    let id: String = row.get(0)?;
    let conversation_id: String = row.get(1)?;
    let role: String = row.get(2)?;
    let content: String = row.get(3)?;
    let tool_calls: Option<String> = row.get(4)?;
    let created_at: i64 = row.get(5)?;
    Ok((|| {
        let tool_calls: Option<Vec<ToolCallRecord>> = match tool_calls {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };
        Ok(Message {
            id: parse_uuid(id)?,
            conversation_id: parse_uuid(conversation_id)?,
            role: role
                .parse::<MessageRole>()
                .map_err(SoukError::Storage)?,
            content,
            tool_calls,
            created_at: epoch_to_datetime(created_at),
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_repo() -> ConversationRepository {
        ConversationRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    // ---- Conversation lifecycle ----

    #[test]
    fn test_create_and_find() {
        let repo = make_repo();
        let user = Uuid::new_v4();
        let conversation = repo.create(user).unwrap();

        let found = repo.find_by_id(conversation.id).unwrap().unwrap();
        assert_eq!(found.id, conversation.id);
        assert_eq!(found.user_id, user);
        assert!(!found.deleted);
    }

    #[test]
    fn test_find_unknown_is_none() {
        let repo = make_repo();
        assert!(repo.find_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_for_user_excludes_soft_deleted() {
        let repo = make_repo();
        let user = Uuid::new_v4();
        let keep = repo.create(user).unwrap();
        let removed = repo.create(user).unwrap();
        repo.create(Uuid::new_v4()).unwrap(); // someone else's

        repo.soft_delete(removed.id).unwrap();

        let listed = repo.list_for_user(user).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep.id);
    }

    #[test]
    fn test_soft_delete_keeps_row_and_messages() {
        let repo = make_repo();
        let conversation = repo.create(Uuid::new_v4()).unwrap();
        repo.append_message(&Message::user(conversation.id, "hello"))
            .unwrap();

        repo.soft_delete(conversation.id).unwrap();

        let found = repo.find_by_id(conversation.id).unwrap().unwrap();
        assert!(found.deleted);
        assert_eq!(repo.messages_for(conversation.id).unwrap().len(), 1);
    }

    #[test]
    fn test_soft_delete_unknown_errors() {
        let repo = make_repo();
        assert!(repo.soft_delete(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_purge_removes_everything() {
        let repo = make_repo();
        let conversation = repo.create(Uuid::new_v4()).unwrap();
        repo.append_message(&Message::user(conversation.id, "hello"))
            .unwrap();

        repo.purge(conversation.id).unwrap();
        assert!(repo.find_by_id(conversation.id).unwrap().is_none());
        assert!(repo.messages_for(conversation.id).unwrap().is_empty());
    }

    // ---- Messages ----

    #[test]
    fn test_messages_come_back_in_order() {
        let repo = make_repo();
        let conversation = repo.create(Uuid::new_v4()).unwrap();

        for i in 0..5 {
            repo.append_message(&Message::user(conversation.id, format!("msg {}", i)))
                .unwrap();
        }

        let messages = repo.messages_for(conversation.id).unwrap();
        assert_eq!(messages.len(), 5);
        for (i, msg) in messages.iter().enumerate() {
            assert_eq!(msg.content, format!("msg {}", i));
        }
    }

    #[test]
    fn test_append_to_unknown_conversation_errors() {
        let repo = make_repo();
        let err = repo.append_message(&Message::user(Uuid::new_v4(), "orphan"));
        assert!(err.is_err());
    }

    #[test]
    fn test_tool_call_records_round_trip() {
        let repo = make_repo();
        let conversation = repo.create(Uuid::new_v4()).unwrap();

        let records = vec![
            ToolCallRecord::ok(
                "search_datasets",
                json!({"query": "credit risk"}),
                json!([{"title": "Consumer Credit Panel"}]),
                "1 result".to_string(),
            ),
            ToolCallRecord::failed(
                "submit_inquiry",
                json!({"inquiry_id": "x"}),
                "confirmation required".to_string(),
            ),
        ];
        repo.append_message(&Message::assistant(
            conversation.id,
            "found one dataset",
            records.clone(),
        ))
        .unwrap();

        let messages = repo.messages_for(conversation.id).unwrap();
        assert_eq!(messages.len(), 1);
        let stored = messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].name, "search_datasets");
        assert_eq!(stored[0].result, records[0].result);
        assert!(stored[1].result.is_none());
        assert_eq!(
            stored[1].result_text.as_deref(),
            Some("confirmation required")
        );
    }

    #[test]
    fn test_user_message_stores_null_tool_calls() {
        let repo = make_repo();
        let conversation = repo.create(Uuid::new_v4()).unwrap();
        repo.append_message(&Message::user(conversation.id, "plain"))
            .unwrap();

        let messages = repo.messages_for(conversation.id).unwrap();
        assert!(messages[0].tool_calls.is_none());
    }

    #[test]
    fn test_roles_survive_round_trip() {
        let repo = make_repo();
        let conversation = repo.create(Uuid::new_v4()).unwrap();
        repo.append_message(&Message::user(conversation.id, "question"))
            .unwrap();
        repo.append_message(&Message::assistant(conversation.id, "answer", vec![]))
            .unwrap();

        let messages = repo.messages_for(conversation.id).unwrap();
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }

    #[test]
    fn test_concurrent_appends_get_distinct_sequences() {
        use std::thread;

        let repo = Arc::new(make_repo());
        let conversation = repo.create(Uuid::new_v4()).unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = Arc::clone(&repo);
            let cid = conversation.id;
            handles.push(thread::spawn(move || {
                repo.append_message(&Message::user(cid, format!("m{}", i)))
            }));
        }
        for h in handles {
            h.join().unwrap().unwrap();
        }

        assert_eq!(repo.messages_for(conversation.id).unwrap().len(), 8);
    }
}
