//! Database schema migrations.
//!
//! Applies the initial schema: conversations and messages, with the
//! tool-call log stored as a JSON column on messages.

use rusqlite::Connection;
use tracing::info;

use souk_core::error::SoukError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), SoukError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| SoukError::Storage(format!("failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| SoukError::Storage(format!("failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: conversations and messages.
fn apply_v1(conn: &Connection) -> Result<(), SoukError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY NOT NULL,
            user_id     TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            deleted     INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations (user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS messages (
            id               TEXT PRIMARY KEY NOT NULL,
            conversation_id  TEXT NOT NULL REFERENCES conversations (id),
            seq              INTEGER NOT NULL,
            role             TEXT NOT NULL
                             CHECK (role IN ('user', 'assistant')),
            content          TEXT NOT NULL,
            tool_calls       TEXT,
            created_at       INTEGER NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_conversation_seq
            ON messages (conversation_id, seq);

        INSERT INTO schema_migrations (version, name)
            VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| SoukError::Storage(format!("migration v1 failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_twice_without_error() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_role_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO conversations (id, user_id, created_at) VALUES ('c', 'u', 0)",
            [],
        )
        .unwrap();

        let bad = conn.execute(
            "INSERT INTO messages (id, conversation_id, seq, role, content, created_at)
             VALUES ('m', 'c', 0, 'system', 'x', 0)",
            [],
        );
        assert!(bad.is_err(), "role CHECK must reject unknown roles");
    }

    #[test]
    fn test_sequence_uniqueness_per_conversation() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO conversations (id, user_id, created_at) VALUES ('c', 'u', 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO messages (id, conversation_id, seq, role, content, created_at)
             VALUES ('m1', 'c', 0, 'user', 'x', 0)",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO messages (id, conversation_id, seq, role, content, created_at)
             VALUES ('m2', 'c', 0, 'user', 'y', 0)",
            [],
        );
        assert!(dup.is_err(), "duplicate seq in one conversation must fail");
    }
}
