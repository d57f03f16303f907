// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The thread entity: one persisted conversation between a user and staff.
//!
//! Every operation re-reads the row before acting; the store is the single
//! source of truth and no field value survives in memory across calls.
//! Survey transitions live in [`crate::gather`], also as `Thread` methods.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use coachmail_core::constants::{EMBEDS_ONLY_PLACEHOLDER, MESSAGE_CHUNK_LEN};
use coachmail_core::types::{
    Attachment, FileUpload, GatherState, InboundMessage, MessageRef, MessageType, StaffActor,
    ThreadStatus,
};
use coachmail_core::{CoachmailError, MessageId, UserId};
use coachmail_storage::{queries, NewThreadMessage, ThreadMessageRow, ThreadRow};

use crate::attachments::{relay_attachment, RelayedAttachment};
use crate::context::ThreadContext;
use crate::util;

/// Handle to one thread. Holds only the id; state is re-read per operation.
#[derive(Clone)]
pub struct Thread {
    pub(crate) id: String,
    pub(crate) ctx: ThreadContext,
}

impl Thread {
    pub(crate) fn new(id: String, ctx: ThreadContext) -> Self {
        Self { id, ctx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current row state. Read-only; mutations go through the operations.
    pub async fn snapshot(&self) -> Result<ThreadRow, CoachmailError> {
        queries::threads::find_by_id(&self.ctx.db, &self.id)
            .await?
            .ok_or_else(|| {
                CoachmailError::Internal(format!("thread {} vanished from storage", self.id))
            })
    }

    /// Transcript viewer URL for this thread, when a viewer is configured.
    pub fn log_url(&self) -> Option<String> {
        self.ctx
            .config
            .threads
            .log_url_base
            .as_ref()
            .map(|base| format!("{}/logs/{}", base.trim_end_matches('/'), self.id))
    }

    // --- relay operations ---

    /// Deliver a staff reply to the user.
    ///
    /// Returns `false` when the user's DMs are unreachable; in that case the
    /// attempt is logged as a COMMAND entry plus a system note and no other
    /// state advances.
    pub async fn reply_to_user(
        &self,
        actor: &StaffActor,
        text: &str,
        attachments: &[Attachment],
        anonymous: bool,
    ) -> Result<bool, CoachmailError> {
        let row = self.snapshot().await?;
        let cfg = &self.ctx.config.threads;

        let staff_display = if cfg.use_nicknames {
            actor.nickname.clone().unwrap_or_else(|| actor.name.clone())
        } else {
            actor.name.clone()
        };
        let user_facing_name = if anonymous {
            actor
                .primary_role
                .clone()
                .unwrap_or_else(|| cfg.anonymous_name.clone())
        } else {
            staff_display.clone()
        };

        let relayed = self.relay_all(attachments).await?;
        let link_block = link_block(&relayed);
        let uploads: Vec<FileUpload> = relayed.iter().filter_map(|r| r.upload.clone()).collect();

        let ts_prefix = if cfg.thread_timestamps {
            util::timestamp_prefix(Utc::now())
        } else {
            String::new()
        };

        let dm_content = format!("**{user_facing_name}:** {text}{link_block}");
        let echo_label = if anonymous {
            format!("(anonymous) {staff_display}")
        } else {
            staff_display.clone()
        };
        let echo_content = format!("{ts_prefix}\u{bb} **{echo_label}:** {text}{link_block}");
        let log_body = format!("{text}{link_block}");

        match self
            .post_to_user(&row.user_id, &dm_content, uploads.first().cloned())
            .await
        {
            Err(e @ CoachmailError::Delivery { .. }) => {
                warn!(thread = %self.id, error = %e, "reply delivery failed");
                self.append_log(
                    MessageType::Command,
                    Some(&actor.id),
                    &staff_display,
                    &format!("FAILED REPLY: {log_body}"),
                    anonymous,
                    None,
                )
                .await?;
                self.post_to_channel(
                    &row,
                    &format!("Could not deliver the reply to the user: {e}"),
                    Vec::new(),
                    true,
                )
                .await?;
                Ok(false)
            }
            Err(e) => Err(e),
            Ok(_dm_ref) => {
                // Extra uploads beyond the first ride their own DMs.
                for upload in uploads.iter().skip(1) {
                    if let Err(e) = self
                        .ctx
                        .gateway
                        .send_private_message(&row.user_id, &upload.filename, Some(upload.clone()))
                        .await
                    {
                        warn!(thread = %self.id, error = %e, "extra attachment DM failed");
                    }
                }

                let echo = self
                    .post_to_channel(&row, &echo_content, uploads.clone(), false)
                    .await?;
                self.append_log(
                    MessageType::ToUser,
                    Some(&actor.id),
                    &user_facing_name,
                    &log_body,
                    anonymous,
                    echo.map(|m| m.message),
                )
                .await?;

                // Any staff reply doubles as the wait-time acknowledgment.
                queries::threads::set_apology_sent(&self.ctx.db, &self.id, &util::now_ts())
                    .await?;
                self.cancel_close_due_to_activity(&row).await?;
                info!(thread = %self.id, staff = %actor.id, anonymous, "reply delivered");
                Ok(true)
            }
        }
    }

    /// Relay an inbound user DM into the staff channel and run the survey /
    /// side-channel bookkeeping that hangs off user activity.
    pub async fn receive_user_reply(&self, msg: &InboundMessage) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        let cfg = &self.ctx.config.threads;

        let mut content = msg.content.trim().to_string();
        if content.is_empty() && msg.embed_count > 0 {
            content = EMBEDS_ONLY_PLACEHOLDER.to_string();
        }

        let relayed = self.relay_all(&msg.attachments).await?;
        let link_block = link_block(&relayed);
        let uploads: Vec<FileUpload> = relayed.iter().filter_map(|r| r.upload.clone()).collect();

        let now = Utc::now();
        let ts_prefix = if cfg.thread_timestamps {
            util::timestamp_prefix(now)
        } else {
            String::new()
        };
        let mention_prefix = self.subscriber_mention(&row, now).await?;

        let echo_content = util::disable_link_previews(&format!(
            "{mention_prefix}{ts_prefix}**{}:** {content}{link_block}",
            row.user_name
        ));
        let log_body = format!("{content}{link_block}");

        let posted = self.post_to_channel(&row, &echo_content, uploads, false).await?;
        if posted.is_none() {
            // Channel gone; the thread was closed underneath us.
            return Ok(());
        }
        self.append_log(
            MessageType::FromUser,
            Some(&row.user_id),
            &row.user_name,
            &log_body,
            false,
            Some(msg.id.clone()),
        )
        .await?;

        // Control keywords only matter while the survey is unfinished.
        if !row.gather.is_complete() {
            let keyword = content.to_lowercase();
            if keyword == "restart" {
                self.restart_gather(&row).await?;
                self.cancel_close_due_to_activity(&row).await?;
                return Ok(());
            }
            if keyword == "cancel" {
                self.cancel_gather(&row).await?;
                return Ok(());
            }
        }

        self.cancel_close_due_to_activity(&row).await?;

        // Alerts are consume-once: clear before pinging.
        if let Some(alert) = &row.alert_user_id {
            queries::threads::set_alert(&self.ctx.db, &self.id, None).await?;
            self.post_to_channel(
                &row,
                &format!("{} new message from {}", util::mention(alert), row.user_name),
                Vec::new(),
                true,
            )
            .await?;
        }

        if matches!(row.gather, GatherState::AwaitingRequest { .. }) {
            self.finish_gather(Some(&content)).await?;
        }
        Ok(())
    }

    // --- lifecycle ---

    /// Close the thread. Safe to call on an already-closed thread.
    pub async fn close(&self, suppress_notice: bool, silent: bool) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        if row.status == ThreadStatus::Closed {
            debug!(thread = %self.id, "close on already-closed thread; nothing to do");
            return Ok(());
        }

        if !suppress_notice {
            let notice = if silent {
                "This conversation has been archived."
            } else {
                "This thread has been closed. Send a new message any time to open another one."
            };
            if let Err(e) = self.post_to_user(&row.user_id, notice, None).await {
                warn!(thread = %self.id, error = %e, "close notice delivery failed");
            }
        }

        queries::threads::update_status(&self.ctx.db, &self.id, ThreadStatus::Closed).await?;

        // Status is the durable source of truth; channel deletion is
        // best-effort.
        if let Err(e) = self.ctx.gateway.delete_channel(&row.channel_id).await {
            warn!(thread = %self.id, error = %e, "relay channel deletion failed");
        }
        info!(thread = %self.id, silent, "thread closed");
        Ok(())
    }

    pub async fn schedule_close(
        &self,
        at: DateTime<Utc>,
        actor: &StaffActor,
        silent: bool,
    ) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        queries::threads::set_scheduled_close(
            &self.ctx.db,
            &self.id,
            &util::ts(at),
            &actor.id,
            &actor.name,
            silent,
        )
        .await?;
        self.post_to_channel(
            &row,
            &format!(
                "Thread is scheduled to close at {} (by {}).",
                util::ts(at),
                actor.name
            ),
            Vec::new(),
            true,
        )
        .await?;
        Ok(())
    }

    pub async fn cancel_scheduled_close(&self) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        if row.scheduled_close_at.is_none() {
            return Ok(());
        }
        queries::threads::clear_scheduled_close(&self.ctx.db, &self.id).await?;
        self.post_to_channel(&row, "Scheduled close cancelled.", Vec::new(), true)
            .await?;
        Ok(())
    }

    pub async fn schedule_suspend(
        &self,
        at: DateTime<Utc>,
        actor: &StaffActor,
    ) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        queries::threads::set_scheduled_suspend(
            &self.ctx.db,
            &self.id,
            &util::ts(at),
            &actor.id,
            &actor.name,
        )
        .await?;
        self.post_to_channel(
            &row,
            &format!(
                "Thread is scheduled to be suspended at {} (by {}).",
                util::ts(at),
                actor.name
            ),
            Vec::new(),
            true,
        )
        .await?;
        Ok(())
    }

    pub async fn cancel_scheduled_suspend(&self) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        if row.scheduled_suspend_at.is_none() {
            return Ok(());
        }
        queries::threads::clear_scheduled_suspend(&self.ctx.db, &self.id).await?;
        self.post_to_channel(&row, "Scheduled suspend cancelled.", Vec::new(), true)
            .await?;
        Ok(())
    }

    /// Suspend the thread, clearing any pending scheduled suspend in the
    /// same transition.
    pub async fn suspend(&self) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        if row.status != ThreadStatus::Open {
            debug!(thread = %self.id, status = %row.status, "suspend skipped");
            return Ok(());
        }
        queries::threads::mark_suspended(&self.ctx.db, &self.id).await?;
        self.post_to_channel(
            &row,
            "Thread suspended. New DMs from this user will open a new thread until it is unsuspended.",
            Vec::new(),
            true,
        )
        .await?;
        info!(thread = %self.id, "thread suspended");
        Ok(())
    }

    /// Reopen a suspended thread, unless the user opened another thread in
    /// the meantime.
    pub async fn unsuspend(&self) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        if row.status != ThreadStatus::Suspended {
            return Err(CoachmailError::Validation(
                "thread is not suspended".to_string(),
            ));
        }
        if queries::threads::find_open_by_user(&self.ctx.db, &row.user_id)
            .await?
            .is_some()
        {
            return Err(CoachmailError::Validation(
                "user already has another open thread; close it first".to_string(),
            ));
        }
        queries::threads::update_status(&self.ctx.db, &self.id, ThreadStatus::Open).await?;
        self.post_to_channel(&row, "Thread unsuspended.", Vec::new(), true)
            .await?;
        info!(thread = %self.id, "thread unsuspended");
        Ok(())
    }

    // --- side channels ---

    /// Arm (or clear) the one-shot alert for the next user reply.
    pub async fn set_alert(&self, user: Option<&UserId>) -> Result<(), CoachmailError> {
        queries::threads::set_alert(&self.ctx.db, &self.id, user).await
    }

    /// Subscribe/unsubscribe the actor. Returns the user-facing outcome
    /// message; validation failures are messages too, never errors.
    pub async fn toggle_sub(
        &self,
        actor: &StaffActor,
        timeout_minutes: Option<i64>,
    ) -> Result<String, CoachmailError> {
        let row = self.snapshot().await?;
        match &row.sub_id {
            Some(current) if *current != actor.id => {
                Ok("Someone else is already subscribed to this thread.".to_string())
            }
            Some(_) => {
                queries::threads::clear_sub(&self.ctx.db, &self.id).await?;
                Ok("Unsubscribed from this thread.".to_string())
            }
            None => {
                if let Some(timeout) = timeout_minutes
                    && !(0..=1440).contains(&timeout)
                {
                    return Ok(
                        "The mention timeout must be between 0 and 1440 minutes.".to_string()
                    );
                }
                queries::threads::set_sub(
                    &self.ctx.db,
                    &self.id,
                    &actor.id,
                    timeout_minutes,
                    &util::now_ts(),
                )
                .await?;
                Ok(match timeout_minutes {
                    Some(timeout) if timeout > 0 => format!(
                        "Subscribed to this thread (mentioned at most every {timeout} minutes)."
                    ),
                    _ => "Subscribed to this thread.".to_string(),
                })
            }
        }
    }

    /// Toggle the actor's autoreply membership. The returned state is
    /// computed before persistence and is advisory for this actor only.
    pub async fn toggle_autoreply(&self, actor: &UserId) -> Result<bool, CoachmailError> {
        let row = self.snapshot().await?;
        let mut users = row.autoreply_users.clone();
        let new_state = if let Some(pos) = users.iter().position(|u| u == &actor.0) {
            users.remove(pos);
            false
        } else {
            users.push(actor.0.clone());
            true
        };
        queries::threads::set_autoreply_users(&self.ctx.db, &self.id, &users).await?;
        Ok(new_state)
    }

    /// Send the wait-time apology, then stamp it regardless of delivery.
    /// At-most-once is the sweep's responsibility (it filters on the stamp).
    pub async fn apologise(&self) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        let message = self
            .ctx
            .config
            .scheduler
            .apology_message
            .clone()
            .unwrap_or_else(|| {
                "Sorry for the wait; a coach will be with you as soon as possible.".to_string()
            });
        if let Err(e) = self.post_to_user(&row.user_id, &message, None).await {
            warn!(thread = %self.id, error = %e, "apology delivery failed");
            let _ = self
                .post_to_channel(
                    &row,
                    &format!("Could not deliver the wait-time apology: {e}"),
                    Vec::new(),
                    true,
                )
                .await;
        }
        queries::threads::set_apology_sent(&self.ctx.db, &self.id, &util::now_ts()).await?;
        Ok(())
    }

    /// Tag the thread with a role for capacity tracking. First write wins.
    pub async fn set_role(&self, role: &str) -> Result<bool, CoachmailError> {
        let wrote = queries::threads::set_thread_role(&self.ctx.db, &self.id, role).await?;
        if !wrote {
            let row = self.snapshot().await?;
            self.post_to_channel(
                &row,
                "This thread already has a role assigned.",
                Vec::new(),
                true,
            )
            .await?;
        }
        Ok(wrote)
    }

    /// Claim this thread: move its relay channel out of the waiting
    /// category into the actor's own category, created on demand.
    ///
    /// Returns `false` when the thread is not parked in the waiting
    /// category (already claimed, or no waiting category is configured).
    pub async fn claim(&self, actor: &StaffActor) -> Result<bool, CoachmailError> {
        let row = self.snapshot().await?;
        let Some(waiting) = &self.ctx.config.threads.waiting_category else {
            return Ok(false);
        };
        let parked = self
            .ctx
            .gateway
            .channel_parent(&row.channel_id)
            .await?
            .is_some_and(|p| p.0 == *waiting);
        if !parked {
            debug!(thread = %self.id, "claim skipped; thread is not waiting");
            return Ok(false);
        }

        let category_name = util::slug_with_id(&actor.name, &actor.id.0);
        let category = self.ctx.gateway.ensure_category(&category_name).await?;
        self.ctx
            .gateway
            .set_channel_parent(&row.channel_id, &category)
            .await?;
        self.post_to_channel(
            &row,
            &format!("Thread claimed by **{}**.", actor.name),
            Vec::new(),
            true,
        )
        .await?;
        info!(thread = %self.id, staff = %actor.id, "thread claimed");
        Ok(true)
    }

    // --- transcript ---

    /// Log staff channel chatter (not relayed to the user).
    pub async fn save_chat_message(
        &self,
        actor: &StaffActor,
        body: &str,
        dm_message_id: Option<MessageId>,
    ) -> Result<(), CoachmailError> {
        self.append_log(
            MessageType::Chat,
            Some(&actor.id),
            &actor.name,
            body,
            false,
            dm_message_id,
        )
        .await?;
        Ok(())
    }

    /// Log a command invocation.
    pub async fn save_command_message(
        &self,
        actor: &StaffActor,
        body: &str,
        dm_message_id: Option<MessageId>,
    ) -> Result<(), CoachmailError> {
        self.append_log(
            MessageType::Command,
            Some(&actor.id),
            &actor.name,
            body,
            false,
            dm_message_id,
        )
        .await?;
        Ok(())
    }

    /// Edit propagation for staff messages logged in this thread.
    pub async fn update_chat_message(
        &self,
        dm_message_id: &MessageId,
        new_body: &str,
    ) -> Result<bool, CoachmailError> {
        queries::messages::update_body_by_dm_id(&self.ctx.db, &self.id, dm_message_id, new_body)
            .await
    }

    /// Delete propagation for staff messages logged in this thread.
    pub async fn delete_chat_message(
        &self,
        dm_message_id: &MessageId,
    ) -> Result<bool, CoachmailError> {
        queries::messages::delete_by_dm_id(&self.ctx.db, &self.id, dm_message_id).await
    }

    /// Full transcript in `(created_at, id)` order.
    pub async fn messages(&self) -> Result<Vec<ThreadMessageRow>, CoachmailError> {
        queries::messages::messages_for_thread(&self.ctx.db, &self.id).await
    }

    /// Post a system notice to the relay channel and log it.
    pub async fn post_system_message(
        &self,
        content: &str,
    ) -> Result<Option<MessageRef>, CoachmailError> {
        let row = self.snapshot().await?;
        self.post_to_channel(&row, content, Vec::new(), true).await
    }

    // --- internals shared with the survey module ---

    /// Channel post with the ChannelGone recovery path: a deleted relay
    /// channel silently closes the thread and yields `None`.
    pub(crate) async fn post_to_channel(
        &self,
        row: &ThreadRow,
        content: &str,
        files: Vec<FileUpload>,
        log_as_system: bool,
    ) -> Result<Option<MessageRef>, CoachmailError> {
        match self
            .ctx
            .gateway
            .send_channel_message(&row.channel_id, content, files)
            .await
        {
            Ok(msg) => {
                if log_as_system {
                    self.append_log(MessageType::System, None, "system", content, false, None)
                        .await?;
                }
                Ok(Some(msg))
            }
            Err(CoachmailError::ChannelGone) => {
                warn!(thread = %self.id, "relay channel is gone; closing thread silently");
                self.close(true, true).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// DM the user, chunking at the platform limit. A file rides the final
    /// chunk only. Returns the last delivered message.
    pub(crate) async fn post_to_user(
        &self,
        user: &UserId,
        content: &str,
        file: Option<FileUpload>,
    ) -> Result<MessageRef, CoachmailError> {
        let chunks = util::chunk_text(content, MESSAGE_CHUNK_LEN);
        let last = chunks.len() - 1;
        let mut delivered = None;
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_file = if i == last { file.clone() } else { None };
            delivered = Some(
                self.ctx
                    .gateway
                    .send_private_message(user, chunk, chunk_file)
                    .await?,
            );
        }
        delivered.ok_or_else(|| CoachmailError::Internal("empty chunk set".to_string()))
    }

    pub(crate) async fn append_log(
        &self,
        message_type: MessageType,
        user_id: Option<&UserId>,
        user_name: &str,
        body: &str,
        is_anonymous: bool,
        dm_message_id: Option<MessageId>,
    ) -> Result<i64, CoachmailError> {
        queries::messages::insert_message(
            &self.ctx.db,
            &NewThreadMessage {
                thread_id: self.id.clone(),
                message_type,
                user_id: user_id.cloned(),
                user_name: user_name.to_string(),
                body: body.to_string(),
                is_anonymous,
                dm_message_id,
                created_at: util::now_ts(),
            },
        )
        .await
    }

    async fn relay_all(
        &self,
        attachments: &[Attachment],
    ) -> Result<Vec<RelayedAttachment>, CoachmailError> {
        let mut relayed = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            relayed.push(
                relay_attachment(
                    self.ctx.attachments.as_ref(),
                    &self.ctx.config.relay,
                    attachment,
                )
                .await?,
            );
        }
        Ok(relayed)
    }

    /// Mention prefix for the subscriber, rate limited by the configured
    /// window. `sub_last_ping_at` moves only when the mention fires.
    async fn subscriber_mention(
        &self,
        row: &ThreadRow,
        now: DateTime<Utc>,
    ) -> Result<String, CoachmailError> {
        let Some(sub) = &row.sub_id else {
            return Ok(String::new());
        };
        let fire = match (row.sub_timeout_minutes, &row.sub_last_ping_at) {
            (None, _) | (Some(0), _) => true,
            (Some(_), None) => true,
            (Some(timeout), Some(last)) => match DateTime::parse_from_rfc3339(last) {
                Ok(last) => now - last.with_timezone(&Utc) >= Duration::minutes(timeout),
                Err(_) => true,
            },
        };
        if !fire {
            return Ok(String::new());
        }
        queries::threads::touch_sub_last(&self.ctx.db, &self.id, &util::ts(now)).await?;
        Ok(format!("{} ", util::mention(sub)))
    }

    async fn cancel_close_due_to_activity(&self, row: &ThreadRow) -> Result<(), CoachmailError> {
        if row.scheduled_close_at.is_none() {
            return Ok(());
        }
        queries::threads::clear_scheduled_close(&self.ctx.db, &self.id).await?;
        self.post_to_channel(
            row,
            "Cancelled scheduled close due to new activity.",
            Vec::new(),
            true,
        )
        .await?;
        Ok(())
    }
}

fn link_block(relayed: &[RelayedAttachment]) -> String {
    let mut block = String::new();
    for attachment in relayed {
        block.push('\n');
        block.push_str(&attachment.formatted);
    }
    block
}
