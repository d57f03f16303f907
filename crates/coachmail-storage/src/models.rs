// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the `threads` and `thread_messages` tables.

use coachmail_core::types::{GatherState, MessageId, MessageType, ThreadStatus};
use coachmail_core::{ChannelId, UserId};

/// Column list matching [`ThreadRow::from_row`] indices. Keep in sync.
pub(crate) const THREAD_COLUMNS: &str = "id, status, user_id, user_name, channel_id, created_at, \
     scheduled_close_at, scheduled_close_by, scheduled_close_name, scheduled_close_silent, \
     scheduled_suspend_at, scheduled_suspend_by, scheduled_suspend_name, \
     gather_state, gather_platform_msg, gather_rank_msg, gather_choice_msg, gather_request, \
     autoreply_users, alert_user_id, apology_sent_at, \
     sub_id, sub_last_ping_at, sub_timeout_minutes, thread_role";

/// A persisted thread. Timestamps are UTC RFC3339 strings, which compare
/// lexicographically in SQL.
#[derive(Debug, Clone)]
pub struct ThreadRow {
    pub id: String,
    pub status: ThreadStatus,
    pub user_id: UserId,
    /// Username snapshot taken at creation time.
    pub user_name: String,
    pub channel_id: ChannelId,
    pub created_at: String,

    pub scheduled_close_at: Option<String>,
    pub scheduled_close_by: Option<UserId>,
    pub scheduled_close_name: Option<String>,
    pub scheduled_close_silent: bool,

    pub scheduled_suspend_at: Option<String>,
    pub scheduled_suspend_by: Option<UserId>,
    pub scheduled_suspend_name: Option<String>,

    pub gather: GatherState,

    /// Staff who opted into per-thread autoreply routing.
    pub autoreply_users: Vec<String>,
    pub alert_user_id: Option<UserId>,
    pub apology_sent_at: Option<String>,

    pub sub_id: Option<UserId>,
    pub sub_last_ping_at: Option<String>,
    pub sub_timeout_minutes: Option<i64>,

    /// First-write-wins capacity tag.
    pub thread_role: Option<String>,
}

impl ThreadRow {
    /// A freshly opened thread with every optional group unset.
    pub fn new_open(
        id: String,
        user_id: UserId,
        user_name: String,
        channel_id: ChannelId,
        created_at: String,
        gather: GatherState,
    ) -> Self {
        Self {
            id,
            status: ThreadStatus::Open,
            user_id,
            user_name,
            channel_id,
            created_at,
            scheduled_close_at: None,
            scheduled_close_by: None,
            scheduled_close_name: None,
            scheduled_close_silent: false,
            scheduled_suspend_at: None,
            scheduled_suspend_by: None,
            scheduled_suspend_name: None,
            gather,
            autoreply_users: Vec::new(),
            alert_user_id: None,
            apology_sent_at: None,
            sub_id: None,
            sub_last_ping_at: None,
            sub_timeout_minutes: None,
            thread_role: None,
        }
    }

    /// Decode a row selected with [`THREAD_COLUMNS`]. Domain decode failures
    /// (unknown status code, inconsistent gather columns, bad JSON) surface
    /// as conversion errors so they propagate as storage errors.
    pub(crate) fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        fn bad(
            idx: usize,
            msg: String,
        ) -> rusqlite::Error {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                msg.into(),
            )
        }

        let status_code: i64 = row.get(1)?;
        let status = ThreadStatus::from_code(status_code)
            .ok_or_else(|| bad(1, format!("unknown thread status code {status_code}")))?;

        let gather = GatherState::decode(
            row.get(13)?,
            row.get(14)?,
            row.get(15)?,
            row.get(16)?,
            row.get(17)?,
        )
        .map_err(|e| bad(13, e.to_string()))?;

        let autoreply_raw: String = row.get(18)?;
        let autoreply_users: Vec<String> =
            serde_json::from_str(&autoreply_raw).map_err(|e| bad(18, e.to_string()))?;

        Ok(Self {
            id: row.get(0)?,
            status,
            user_id: UserId(row.get(2)?),
            user_name: row.get(3)?,
            channel_id: ChannelId(row.get(4)?),
            created_at: row.get(5)?,
            scheduled_close_at: row.get(6)?,
            scheduled_close_by: row.get::<_, Option<String>>(7)?.map(UserId),
            scheduled_close_name: row.get(8)?,
            scheduled_close_silent: row
                .get::<_, Option<i64>>(9)?
                .is_some_and(|v| v != 0),
            scheduled_suspend_at: row.get(10)?,
            scheduled_suspend_by: row.get::<_, Option<String>>(11)?.map(UserId),
            scheduled_suspend_name: row.get(12)?,
            gather,
            autoreply_users,
            alert_user_id: row.get::<_, Option<String>>(19)?.map(UserId),
            apology_sent_at: row.get(20)?,
            sub_id: row.get::<_, Option<String>>(21)?.map(UserId),
            sub_last_ping_at: row.get(22)?,
            sub_timeout_minutes: row.get(23)?,
            thread_role: row.get(24)?,
        })
    }
}

/// A persisted transcript entry.
#[derive(Debug, Clone)]
pub struct ThreadMessageRow {
    pub id: i64,
    pub thread_id: String,
    pub message_type: MessageType,
    /// `None` for system entries.
    pub user_id: Option<UserId>,
    pub user_name: String,
    pub body: String,
    pub is_anonymous: bool,
    /// External message id used as the edit/delete correlation key.
    pub dm_message_id: Option<MessageId>,
    pub created_at: String,
}

impl ThreadMessageRow {
    pub(crate) fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        let type_code: i64 = row.get(2)?;
        let message_type = MessageType::from_code(type_code).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Integer,
                format!("unknown message type code {type_code}").into(),
            )
        })?;
        Ok(Self {
            id: row.get(0)?,
            thread_id: row.get(1)?,
            message_type,
            user_id: row.get::<_, Option<String>>(3)?.map(UserId),
            user_name: row.get(4)?,
            body: row.get(5)?,
            is_anonymous: row.get::<_, i64>(6)? != 0,
            dm_message_id: row.get::<_, Option<String>>(7)?.map(MessageId),
            created_at: row.get(8)?,
        })
    }
}

/// A transcript entry about to be inserted.
#[derive(Debug, Clone)]
pub struct NewThreadMessage {
    pub thread_id: String,
    pub message_type: MessageType,
    pub user_id: Option<UserId>,
    pub user_name: String,
    pub body: String,
    pub is_anonymous: bool,
    pub dm_message_id: Option<MessageId>,
    pub created_at: String,
}
