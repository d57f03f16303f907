// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread row operations.
//!
//! Callers pass timestamps in as UTC RFC3339 strings; nothing here reads the
//! clock, which keeps the time-window queries testable.

use std::collections::HashMap;

use rusqlite::params;

use coachmail_core::types::GatherState;
use coachmail_core::{ChannelId, CoachmailError, ThreadStatus, UserId};

use crate::database::{map_tr_err, Database};
use crate::models::{ThreadRow, THREAD_COLUMNS};

/// Insert a freshly created thread.
pub async fn insert_thread(db: &Database, thread: &ThreadRow) -> Result<(), CoachmailError> {
    let t = thread.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let (gather_state, platform_msg, rank_msg, choice_msg, request) = t.gather.encode();
            let autoreply = serde_json::to_string(&t.autoreply_users).map_err(|e| {
                rusqlite::Error::ToSqlConversionFailure(Box::new(e))
            })?;
            conn.execute(
                "INSERT INTO threads (id, status, user_id, user_name, channel_id, created_at, \
                 scheduled_close_at, scheduled_close_by, scheduled_close_name, scheduled_close_silent, \
                 scheduled_suspend_at, scheduled_suspend_by, scheduled_suspend_name, \
                 gather_state, gather_platform_msg, gather_rank_msg, gather_choice_msg, gather_request, \
                 autoreply_users, alert_user_id, apology_sent_at, \
                 sub_id, sub_last_ping_at, sub_timeout_minutes, thread_role) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
                params![
                    t.id,
                    t.status.code(),
                    t.user_id.0,
                    t.user_name,
                    t.channel_id.0,
                    t.created_at,
                    t.scheduled_close_at,
                    t.scheduled_close_by.map(|u| u.0),
                    t.scheduled_close_name,
                    t.scheduled_close_at.as_ref().map(|_| t.scheduled_close_silent as i64),
                    t.scheduled_suspend_at,
                    t.scheduled_suspend_by.map(|u| u.0),
                    t.scheduled_suspend_name,
                    gather_state,
                    platform_msg,
                    rank_msg,
                    choice_msg,
                    request,
                    autoreply,
                    t.alert_user_id.map(|u| u.0),
                    t.apology_sent_at,
                    t.sub_id.map(|u| u.0),
                    t.sub_last_ping_at,
                    t.sub_timeout_minutes,
                    t.thread_role,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

async fn find_one(
    db: &Database,
    where_clause: &'static str,
    param: String,
) -> Result<Option<ThreadRow>, CoachmailError> {
    db.connection()
        .call(move |conn| -> Result<Option<ThreadRow>, rusqlite::Error> {
            let sql = format!("SELECT {THREAD_COLUMNS} FROM threads WHERE {where_clause}");
            let mut stmt = conn.prepare(&sql)?;
            let result = stmt.query_row(params![param], ThreadRow::from_row);
            match result {
                Ok(thread) => Ok(Some(thread)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

async fn find_many(
    db: &Database,
    where_clause: &'static str,
    param: String,
) -> Result<Vec<ThreadRow>, CoachmailError> {
    db.connection()
        .call(move |conn| -> Result<Vec<ThreadRow>, rusqlite::Error> {
            let sql = format!(
                "SELECT {THREAD_COLUMNS} FROM threads WHERE {where_clause} ORDER BY created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let threads = stmt
                .query_map(params![param], ThreadRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(threads)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a thread by its uuid.
pub async fn find_by_id(db: &Database, id: &str) -> Result<Option<ThreadRow>, CoachmailError> {
    find_one(db, "id = ?1", id.to_string()).await
}

/// The user's open thread, if any. The one-open-thread-per-user invariant
/// means at most one row can match.
pub async fn find_open_by_user(
    db: &Database,
    user: &UserId,
) -> Result<Option<ThreadRow>, CoachmailError> {
    find_one(db, "user_id = ?1 AND status = 1", user.0.clone()).await
}

/// The open thread bound to a relay channel.
pub async fn find_open_by_channel(
    db: &Database,
    channel: &ChannelId,
) -> Result<Option<ThreadRow>, CoachmailError> {
    find_one(db, "channel_id = ?1 AND status = 1", channel.0.clone()).await
}

/// The suspended thread bound to a relay channel.
pub async fn find_suspended_by_channel(
    db: &Database,
    channel: &ChannelId,
) -> Result<Option<ThreadRow>, CoachmailError> {
    find_one(db, "channel_id = ?1 AND status = 3", channel.0.clone()).await
}

/// Open or suspended thread for a channel, for staff commands that work on
/// either.
pub async fn find_by_channel(
    db: &Database,
    channel: &ChannelId,
) -> Result<Option<ThreadRow>, CoachmailError> {
    find_one(
        db,
        "channel_id = ?1 AND status IN (1, 3)",
        channel.0.clone(),
    )
    .await
}

/// Closed threads for a user, oldest first. Used for history lookups.
pub async fn closed_by_user(db: &Database, user: &UserId) -> Result<Vec<ThreadRow>, CoachmailError> {
    find_many(db, "user_id = ?1 AND status = 2", user.0.clone()).await
}

/// Count of a user's closed threads.
pub async fn closed_count_by_user(db: &Database, user: &UserId) -> Result<i64, CoachmailError> {
    let user = user.0.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM threads WHERE user_id = ?1 AND status = 2",
                params![user],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Set the lifecycle status.
pub async fn update_status(
    db: &Database,
    id: &str,
    status: ThreadStatus,
) -> Result<(), CoachmailError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET status = ?1 WHERE id = ?2",
                params![status.code(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Arm the scheduled close group. All four fields are written together.
pub async fn set_scheduled_close(
    db: &Database,
    id: &str,
    at: &str,
    by: &UserId,
    by_name: &str,
    silent: bool,
) -> Result<(), CoachmailError> {
    let id = id.to_string();
    let at = at.to_string();
    let by = by.0.clone();
    let by_name = by_name.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET scheduled_close_at = ?1, scheduled_close_by = ?2, \
                 scheduled_close_name = ?3, scheduled_close_silent = ?4 WHERE id = ?5",
                params![at, by, by_name, silent as i64, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Disarm the scheduled close group.
pub async fn clear_scheduled_close(db: &Database, id: &str) -> Result<(), CoachmailError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET scheduled_close_at = NULL, scheduled_close_by = NULL, \
                 scheduled_close_name = NULL, scheduled_close_silent = NULL WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Arm the scheduled suspend group.
pub async fn set_scheduled_suspend(
    db: &Database,
    id: &str,
    at: &str,
    by: &UserId,
    by_name: &str,
) -> Result<(), CoachmailError> {
    let id = id.to_string();
    let at = at.to_string();
    let by = by.0.clone();
    let by_name = by_name.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET scheduled_suspend_at = ?1, scheduled_suspend_by = ?2, \
                 scheduled_suspend_name = ?3 WHERE id = ?4",
                params![at, by, by_name, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Disarm the scheduled suspend group.
pub async fn clear_scheduled_suspend(db: &Database, id: &str) -> Result<(), CoachmailError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET scheduled_suspend_at = NULL, scheduled_suspend_by = NULL, \
                 scheduled_suspend_name = NULL WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Suspend in one statement: flip the status and clear the schedule group so
/// a sweep cannot observe a suspended thread still carrying a due timer.
pub async fn mark_suspended(db: &Database, id: &str) -> Result<(), CoachmailError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET status = 3, scheduled_suspend_at = NULL, \
                 scheduled_suspend_by = NULL, scheduled_suspend_name = NULL WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Persist the survey machine state.
pub async fn set_gather(
    db: &Database,
    id: &str,
    gather: &GatherState,
) -> Result<(), CoachmailError> {
    let id = id.to_string();
    let (state, platform_msg, rank_msg, choice_msg, request) = gather.encode();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET gather_state = ?1, gather_platform_msg = ?2, \
                 gather_rank_msg = ?3, gather_choice_msg = ?4, gather_request = ?5 WHERE id = ?6",
                params![state, platform_msg, rank_msg, choice_msg, request, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Set or clear the one-shot alert.
pub async fn set_alert(
    db: &Database,
    id: &str,
    user: Option<&UserId>,
) -> Result<(), CoachmailError> {
    let id = id.to_string();
    let user = user.map(|u| u.0.clone());
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET alert_user_id = ?1 WHERE id = ?2",
                params![user, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Install the subscriber. The subscribe time is the initial rate-limit
/// baseline.
pub async fn set_sub(
    db: &Database,
    id: &str,
    user: &UserId,
    timeout_minutes: Option<i64>,
    subscribed_at: &str,
) -> Result<(), CoachmailError> {
    let id = id.to_string();
    let user = user.0.clone();
    let subscribed_at = subscribed_at.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET sub_id = ?1, sub_last_ping_at = ?2, \
                 sub_timeout_minutes = ?3 WHERE id = ?4",
                params![user, subscribed_at, timeout_minutes, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove the subscriber.
pub async fn clear_sub(db: &Database, id: &str) -> Result<(), CoachmailError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET sub_id = NULL, sub_last_ping_at = NULL, \
                 sub_timeout_minutes = NULL WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record that a subscriber mention fired.
pub async fn touch_sub_last(db: &Database, id: &str, at: &str) -> Result<(), CoachmailError> {
    let id = id.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE threads SET sub_last_ping_at = ?1 WHERE id = ?2",
                params![at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the autoreply opt-in list.
pub async fn set_autoreply_users(
    db: &Database,
    id: &str,
    users: &[String],
) -> Result<(), CoachmailError> {
    let id = id.to_string();
    let users = users.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let encoded = serde_json::to_string(&users)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            conn.execute(
                "UPDATE threads SET autoreply_users = ?1 WHERE id = ?2",
                params![encoded, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Stamp the apology as sent. First write wins so a concurrent sweep and a
/// first staff reply cannot double-apologise.
pub async fn set_apology_sent(db: &Database, id: &str, at: &str) -> Result<bool, CoachmailError> {
    let id = id.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE threads SET apology_sent_at = ?1 WHERE id = ?2 AND apology_sent_at IS NULL",
                params![at, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Tag the thread with a role. First write wins; returns whether this call
/// was the writer.
pub async fn set_thread_role(db: &Database, id: &str, role: &str) -> Result<bool, CoachmailError> {
    let id = id.to_string();
    let role = role.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE threads SET thread_role = ?1 WHERE id = ?2 AND thread_role IS NULL",
                params![role, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Open threads whose scheduled close is past due at `now`.
pub async fn due_for_close(db: &Database, now: &str) -> Result<Vec<ThreadRow>, CoachmailError> {
    find_many(
        db,
        "status = 1 AND scheduled_close_at IS NOT NULL AND scheduled_close_at <= ?1",
        now.to_string(),
    )
    .await
}

/// Open threads whose scheduled suspend is past due at `now`.
pub async fn due_for_suspend(db: &Database, now: &str) -> Result<Vec<ThreadRow>, CoachmailError> {
    find_many(
        db,
        "status = 1 AND scheduled_suspend_at IS NOT NULL AND scheduled_suspend_at <= ?1",
        now.to_string(),
    )
    .await
}

/// Open threads created at or before `cutoff` that have not yet received
/// the wait-time apology. Survey progress does not matter here; a user
/// parked mid-survey has waited just as long.
pub async fn awaiting_apology(
    db: &Database,
    cutoff: &str,
) -> Result<Vec<ThreadRow>, CoachmailError> {
    db.connection()
        .call({
            let cutoff = cutoff.to_string();
            move |conn| -> Result<Vec<ThreadRow>, rusqlite::Error> {
                let sql = format!(
                    "SELECT {THREAD_COLUMNS} FROM threads \
                     WHERE status = 1 AND apology_sent_at IS NULL AND created_at <= ?1 \
                     ORDER BY created_at"
                );
                let mut stmt = conn.prepare(&sql)?;
                let threads = stmt
                    .query_map(params![cutoff], ThreadRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(threads)
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Open threads created at or before `cutoff` whose survey never finished.
pub async fn expired_incomplete(
    db: &Database,
    cutoff: &str,
) -> Result<Vec<ThreadRow>, CoachmailError> {
    let complete = GatherState::COMPLETE_CODE;
    db.connection()
        .call({
            let cutoff = cutoff.to_string();
            move |conn| -> Result<Vec<ThreadRow>, rusqlite::Error> {
                let sql = format!(
                    "SELECT {THREAD_COLUMNS} FROM threads \
                     WHERE status = 1 AND gather_state < {complete} AND created_at <= ?1 \
                     ORDER BY created_at"
                );
                let mut stmt = conn.prepare(&sql)?;
                let threads = stmt
                    .query_map(params![cutoff], ThreadRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(threads)
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Open-thread counts per role tag, for survey capacity gating.
pub async fn open_counts_by_role(db: &Database) -> Result<HashMap<String, i64>, CoachmailError> {
    db.connection()
        .call(|conn| -> Result<HashMap<String, i64>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT thread_role, COUNT(*) FROM threads \
                 WHERE status = 1 AND thread_role IS NOT NULL GROUP BY thread_role",
            )?;
            let mut counts = HashMap::new();
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (role, count) = row?;
                counts.insert(role, count);
            }
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coachmail_core::types::MessageRef;
    use coachmail_core::{ChannelId, MessageId};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_thread(id: &str, user: &str) -> ThreadRow {
        ThreadRow {
            id: id.to_string(),
            status: ThreadStatus::Open,
            user_id: UserId(user.to_string()),
            user_name: "player".to_string(),
            channel_id: ChannelId(format!("chan-{id}")),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            scheduled_close_at: None,
            scheduled_close_by: None,
            scheduled_close_name: None,
            scheduled_close_silent: false,
            scheduled_suspend_at: None,
            scheduled_suspend_by: None,
            scheduled_suspend_name: None,
            gather: GatherState::AwaitingPlatform { prompt: None },
            autoreply_users: Vec::new(),
            alert_user_id: None,
            apology_sent_at: None,
            sub_id: None,
            sub_last_ping_at: None,
            sub_timeout_minutes: None,
            thread_role: None,
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trips() {
        let (db, _dir) = setup_db().await;
        let thread = make_thread("t1", "u1");
        insert_thread(&db, &thread).await.unwrap();

        let found = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert_eq!(found.id, "t1");
        assert_eq!(found.user_id, UserId("u1".to_string()));
        assert_eq!(found.status, ThreadStatus::Open);
        assert_eq!(found.gather, GatherState::AwaitingPlatform { prompt: None });
        assert!(found.autoreply_users.is_empty());

        assert!(find_by_id(&db, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn open_thread_lookup_ignores_closed_rows() {
        let (db, _dir) = setup_db().await;
        let mut closed = make_thread("t-closed", "u1");
        closed.status = ThreadStatus::Closed;
        insert_thread(&db, &closed).await.unwrap();

        assert!(find_open_by_user(&db, &UserId("u1".into()))
            .await
            .unwrap()
            .is_none());

        let open = make_thread("t-open", "u1");
        insert_thread(&db, &open).await.unwrap();
        let found = find_open_by_user(&db, &UserId("u1".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "t-open");

        assert_eq!(closed_count_by_user(&db, &UserId("u1".into())).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn channel_lookups_respect_status() {
        let (db, _dir) = setup_db().await;
        let mut thread = make_thread("t1", "u1");
        thread.status = ThreadStatus::Suspended;
        insert_thread(&db, &thread).await.unwrap();

        let chan = ChannelId("chan-t1".to_string());
        assert!(find_open_by_channel(&db, &chan).await.unwrap().is_none());
        assert!(find_suspended_by_channel(&db, &chan)
            .await
            .unwrap()
            .is_some());
        assert!(find_by_channel(&db, &chan).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn scheduled_close_group_sets_and_clears_together() {
        let (db, _dir) = setup_db().await;
        insert_thread(&db, &make_thread("t1", "u1")).await.unwrap();

        set_scheduled_close(
            &db,
            "t1",
            "2026-01-02T00:00:00.000Z",
            &UserId("staff-1".into()),
            "coach",
            true,
        )
        .await
        .unwrap();

        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert_eq!(t.scheduled_close_at.as_deref(), Some("2026-01-02T00:00:00.000Z"));
        assert_eq!(t.scheduled_close_by, Some(UserId("staff-1".into())));
        assert_eq!(t.scheduled_close_name.as_deref(), Some("coach"));
        assert!(t.scheduled_close_silent);

        clear_scheduled_close(&db, "t1").await.unwrap();
        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert!(t.scheduled_close_at.is_none());
        assert!(t.scheduled_close_by.is_none());
        assert!(t.scheduled_close_name.is_none());
        assert!(!t.scheduled_close_silent);
    }

    #[tokio::test]
    async fn mark_suspended_clears_the_suspend_group() {
        let (db, _dir) = setup_db().await;
        insert_thread(&db, &make_thread("t1", "u1")).await.unwrap();
        set_scheduled_suspend(
            &db,
            "t1",
            "2026-01-02T00:00:00.000Z",
            &UserId("staff-1".into()),
            "coach",
        )
        .await
        .unwrap();

        mark_suspended(&db, "t1").await.unwrap();

        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert_eq!(t.status, ThreadStatus::Suspended);
        assert!(t.scheduled_suspend_at.is_none());
        assert!(t.scheduled_suspend_by.is_none());
    }

    #[tokio::test]
    async fn gather_state_persists_through_updates() {
        let (db, _dir) = setup_db().await;
        insert_thread(&db, &make_thread("t1", "u1")).await.unwrap();

        let state = GatherState::AwaitingRank {
            platform: MessageRef {
                channel: ChannelId("c".into()),
                message: MessageId("m1".into()),
            },
            prompt: MessageRef {
                channel: ChannelId("c".into()),
                message: MessageId("m2".into()),
            },
        };
        set_gather(&db, "t1", &state).await.unwrap();

        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert_eq!(t.gather, state);
    }

    #[tokio::test]
    async fn apology_stamp_is_first_write_wins() {
        let (db, _dir) = setup_db().await;
        insert_thread(&db, &make_thread("t1", "u1")).await.unwrap();

        assert!(set_apology_sent(&db, "t1", "2026-01-01T01:00:00.000Z")
            .await
            .unwrap());
        assert!(!set_apology_sent(&db, "t1", "2026-01-01T02:00:00.000Z")
            .await
            .unwrap());

        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert_eq!(t.apology_sent_at.as_deref(), Some("2026-01-01T01:00:00.000Z"));
    }

    #[tokio::test]
    async fn thread_role_is_first_write_wins() {
        let (db, _dir) = setup_db().await;
        insert_thread(&db, &make_thread("t1", "u1")).await.unwrap();

        assert!(set_thread_role(&db, "t1", "tank").await.unwrap());
        assert!(!set_thread_role(&db, "t1", "support").await.unwrap());

        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert_eq!(t.thread_role.as_deref(), Some("tank"));
    }

    #[tokio::test]
    async fn sub_lifecycle_round_trips() {
        let (db, _dir) = setup_db().await;
        insert_thread(&db, &make_thread("t1", "u1")).await.unwrap();

        set_sub(
            &db,
            "t1",
            &UserId("staff-1".into()),
            Some(30),
            "2026-01-01T02:00:00.000Z",
        )
        .await
        .unwrap();
        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert_eq!(t.sub_id, Some(UserId("staff-1".into())));
        assert_eq!(t.sub_timeout_minutes, Some(30));
        assert_eq!(t.sub_last_ping_at.as_deref(), Some("2026-01-01T02:00:00.000Z"));

        touch_sub_last(&db, "t1", "2026-01-01T03:00:00.000Z")
            .await
            .unwrap();
        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert_eq!(t.sub_last_ping_at.as_deref(), Some("2026-01-01T03:00:00.000Z"));

        clear_sub(&db, "t1").await.unwrap();
        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert!(t.sub_id.is_none());
        assert!(t.sub_timeout_minutes.is_none());
    }

    #[tokio::test]
    async fn autoreply_list_round_trips_as_json() {
        let (db, _dir) = setup_db().await;
        insert_thread(&db, &make_thread("t1", "u1")).await.unwrap();

        set_autoreply_users(&db, "t1", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        let t = find_by_id(&db, "t1").await.unwrap().unwrap();
        assert_eq!(t.autoreply_users, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn due_queries_use_the_cutoff() {
        let (db, _dir) = setup_db().await;
        insert_thread(&db, &make_thread("t1", "u1")).await.unwrap();
        insert_thread(&db, &make_thread("t2", "u2")).await.unwrap();
        set_scheduled_close(
            &db,
            "t1",
            "2026-01-01T01:00:00.000Z",
            &UserId("s".into()),
            "coach",
            false,
        )
        .await
        .unwrap();

        let due = due_for_close(&db, "2026-01-01T00:30:00.000Z").await.unwrap();
        assert!(due.is_empty());

        let due = due_for_close(&db, "2026-01-01T01:00:00.000Z").await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "t1");
    }

    #[tokio::test]
    async fn awaiting_apology_covers_mid_survey_threads() {
        let (db, _dir) = setup_db().await;
        let mut done = make_thread("t-done", "u1");
        done.gather = GatherState::Complete;
        insert_thread(&db, &done).await.unwrap();
        // Still at the first survey step; it has waited just as long.
        let mut mid = make_thread("t-survey", "u2");
        mid.created_at = "2026-01-01T00:05:00.000Z".to_string();
        insert_thread(&db, &mid).await.unwrap();

        let waiting = awaiting_apology(&db, "2026-01-01T00:05:00.000Z")
            .await
            .unwrap();
        let ids: Vec<&str> = waiting.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t-done", "t-survey"]);

        set_apology_sent(&db, "t-done", "2026-01-01T01:00:00.000Z")
            .await
            .unwrap();
        let waiting = awaiting_apology(&db, "2026-01-01T00:05:00.000Z")
            .await
            .unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, "t-survey");
    }

    #[tokio::test]
    async fn expired_incomplete_finds_unfinished_surveys_only() {
        let (db, _dir) = setup_db().await;
        let mut done = make_thread("t-done", "u1");
        done.gather = GatherState::Complete;
        insert_thread(&db, &done).await.unwrap();
        insert_thread(&db, &make_thread("t-survey", "u2")).await.unwrap();

        let expired = expired_incomplete(&db, "2026-01-01T00:00:00.000Z")
            .await
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "t-survey");
    }

    #[tokio::test]
    async fn role_counts_cover_open_tagged_threads() {
        let (db, _dir) = setup_db().await;
        insert_thread(&db, &make_thread("t1", "u1")).await.unwrap();
        insert_thread(&db, &make_thread("t2", "u2")).await.unwrap();
        insert_thread(&db, &make_thread("t3", "u3")).await.unwrap();
        set_thread_role(&db, "t1", "tank").await.unwrap();
        set_thread_role(&db, "t2", "tank").await.unwrap();
        set_thread_role(&db, "t3", "support").await.unwrap();
        update_status(&db, "t3", ThreadStatus::Closed).await.unwrap();

        let counts = open_counts_by_role(&db).await.unwrap();
        assert_eq!(counts.get("tank"), Some(&2));
        assert_eq!(counts.get("support"), None);
    }
}
