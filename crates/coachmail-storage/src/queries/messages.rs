// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript entry operations.

use rusqlite::params;

use coachmail_core::{CoachmailError, MessageId};

use crate::database::{map_tr_err, Database};
use crate::models::{NewThreadMessage, ThreadMessageRow};

const MESSAGE_COLUMNS: &str =
    "id, thread_id, message_type, user_id, user_name, body, is_anonymous, dm_message_id, created_at";

/// Append a transcript entry. Returns the row id.
pub async fn insert_message(
    db: &Database,
    message: &NewThreadMessage,
) -> Result<i64, CoachmailError> {
    let m = message.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO thread_messages \
                 (thread_id, message_type, user_id, user_name, body, is_anonymous, dm_message_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    m.thread_id,
                    m.message_type.code(),
                    m.user_id.map(|u| u.0),
                    m.user_name,
                    m.body,
                    m.is_anonymous as i64,
                    m.dm_message_id.map(|id| id.0),
                    m.created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Full transcript for a thread. Ordered by `(created_at, id)` so entries
/// sharing a timestamp keep insertion order.
pub async fn messages_for_thread(
    db: &Database,
    thread_id: &str,
) -> Result<Vec<ThreadMessageRow>, CoachmailError> {
    let thread_id = thread_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<ThreadMessageRow>, rusqlite::Error> {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM thread_messages \
                 WHERE thread_id = ?1 ORDER BY created_at, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let messages = stmt
                .query_map(params![thread_id], ThreadMessageRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Edit propagation: rewrite the stored body for the entry correlated with a
/// platform message. Returns whether an entry matched.
pub async fn update_body_by_dm_id(
    db: &Database,
    thread_id: &str,
    dm_message_id: &MessageId,
    new_body: &str,
) -> Result<bool, CoachmailError> {
    let thread_id = thread_id.to_string();
    let dm_message_id = dm_message_id.0.clone();
    let new_body = new_body.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE thread_messages SET body = ?1 \
                 WHERE thread_id = ?2 AND dm_message_id = ?3",
                params![new_body, thread_id, dm_message_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete propagation: drop the entry correlated with a platform message.
pub async fn delete_by_dm_id(
    db: &Database,
    thread_id: &str,
    dm_message_id: &MessageId,
) -> Result<bool, CoachmailError> {
    let thread_id = thread_id.to_string();
    let dm_message_id = dm_message_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "DELETE FROM thread_messages WHERE thread_id = ?1 AND dm_message_id = ?2",
                params![thread_id, dm_message_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coachmail_core::types::{GatherState, MessageType, ThreadStatus};
    use coachmail_core::{ChannelId, UserId};
    use tempfile::tempdir;

    use crate::models::ThreadRow;
    use crate::queries::threads;

    async fn setup_thread() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let thread = ThreadRow {
            id: "t1".to_string(),
            status: ThreadStatus::Open,
            user_id: UserId("u1".to_string()),
            user_name: "player".to_string(),
            channel_id: ChannelId("c1".to_string()),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            scheduled_close_at: None,
            scheduled_close_by: None,
            scheduled_close_name: None,
            scheduled_close_silent: false,
            scheduled_suspend_at: None,
            scheduled_suspend_by: None,
            scheduled_suspend_name: None,
            gather: GatherState::Complete,
            autoreply_users: Vec::new(),
            alert_user_id: None,
            apology_sent_at: None,
            sub_id: None,
            sub_last_ping_at: None,
            sub_timeout_minutes: None,
            thread_role: None,
        };
        threads::insert_thread(&db, &thread).await.unwrap();
        (db, dir)
    }

    fn make_message(body: &str, at: &str, dm_id: Option<&str>) -> NewThreadMessage {
        NewThreadMessage {
            thread_id: "t1".to_string(),
            message_type: MessageType::FromUser,
            user_id: Some(UserId("u1".to_string())),
            user_name: "player".to_string(),
            body: body.to_string(),
            is_anonymous: false,
            dm_message_id: dm_id.map(|id| MessageId(id.to_string())),
            created_at: at.to_string(),
        }
    }

    #[tokio::test]
    async fn transcript_is_ordered_by_timestamp_then_rowid() {
        let (db, _dir) = setup_thread().await;
        // Same timestamp on purpose: insertion order must win.
        insert_message(&db, &make_message("first", "2026-01-01T00:00:01.000Z", None))
            .await
            .unwrap();
        insert_message(&db, &make_message("second", "2026-01-01T00:00:01.000Z", None))
            .await
            .unwrap();
        insert_message(&db, &make_message("earlier", "2026-01-01T00:00:00.500Z", None))
            .await
            .unwrap();

        let transcript = messages_for_thread(&db, "t1").await.unwrap();
        let bodies: Vec<&str> = transcript.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["earlier", "first", "second"]);
    }

    #[tokio::test]
    async fn edit_propagation_rewrites_the_correlated_entry() {
        let (db, _dir) = setup_thread().await;
        insert_message(&db, &make_message("typo", "2026-01-01T00:00:01.000Z", Some("dm-1")))
            .await
            .unwrap();

        let matched = update_body_by_dm_id(&db, "t1", &MessageId("dm-1".into()), "fixed")
            .await
            .unwrap();
        assert!(matched);

        let transcript = messages_for_thread(&db, "t1").await.unwrap();
        assert_eq!(transcript[0].body, "fixed");

        let matched = update_body_by_dm_id(&db, "t1", &MessageId("dm-missing".into()), "x")
            .await
            .unwrap();
        assert!(!matched);
    }

    #[tokio::test]
    async fn delete_propagation_drops_the_correlated_entry() {
        let (db, _dir) = setup_thread().await;
        insert_message(&db, &make_message("oops", "2026-01-01T00:00:01.000Z", Some("dm-1")))
            .await
            .unwrap();
        insert_message(&db, &make_message("keep", "2026-01-01T00:00:02.000Z", Some("dm-2")))
            .await
            .unwrap();

        assert!(delete_by_dm_id(&db, "t1", &MessageId("dm-1".into()))
            .await
            .unwrap());

        let transcript = messages_for_thread(&db, "t1").await.unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].body, "keep");
    }

    #[tokio::test]
    async fn system_entries_persist_without_an_author() {
        let (db, _dir) = setup_thread().await;
        let entry = NewThreadMessage {
            thread_id: "t1".to_string(),
            message_type: MessageType::System,
            user_id: None,
            user_name: "system".to_string(),
            body: "Thread closed.".to_string(),
            is_anonymous: false,
            dm_message_id: None,
            created_at: "2026-01-01T00:00:01.000Z".to_string(),
        };
        insert_message(&db, &entry).await.unwrap();

        let transcript = messages_for_thread(&db, "t1").await.unwrap();
        assert_eq!(transcript[0].message_type, MessageType::System);
        assert!(transcript[0].user_id.is_none());
    }
}
