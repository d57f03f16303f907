// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event routing from the chat platform into threads.
//!
//! Private messages are serialized through the intake queue; everything
//! else (reactions, staff channel traffic, edit/delete propagation) goes
//! straight to the thread keyed by user or channel.

use std::sync::Arc;

use tracing::{debug, warn};

use coachmail_core::constants::ACCIDENTAL_THREAD_MESSAGES;
use coachmail_core::types::{Attachment, InboundMessage, MessageRef, StaffActor, UserRef};
use coachmail_core::{ChannelId, CoachmailError, MessageId, UserId};

use crate::context::ThreadContext;
use crate::gather::ReactionOutcome;
use crate::registry::ThreadRegistry;

pub struct MailEngine {
    ctx: ThreadContext,
    registry: Arc<ThreadRegistry>,
}

impl MailEngine {
    pub fn new(ctx: ThreadContext) -> Self {
        let registry = Arc::new(ThreadRegistry::new(ctx.clone()));
        Self { ctx, registry }
    }

    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// Enqueue an inbound private message.
    ///
    /// Returns once the job is queued, not once it has run; the intake
    /// queue drains one message at a time, so two DMs racing the open-thread
    /// check can never both create a thread.
    pub fn handle_private_message(&self, user: UserRef, msg: InboundMessage) {
        let registry = self.registry.clone();
        let ignore_accidental = self.ctx.config.threads.ignore_accidental_threads;
        self.ctx.queue.push(async move {
            if let Err(e) = intake(&registry, &user, &msg, ignore_accidental).await {
                warn!(user = %user.id, error = %e, "private message handling failed");
            }
        });
    }

    /// Route a reaction from an end user into their open thread's survey.
    pub async fn handle_reaction(
        &self,
        user: &UserId,
        msg: &MessageRef,
        symbol: &str,
    ) -> Result<ReactionOutcome, CoachmailError> {
        let Some(thread) = self.registry.find_open_by_user(user).await? else {
            return Ok(ReactionOutcome::Ignored);
        };
        thread.handle_reaction(msg, symbol).await
    }

    /// A staff message in a relay channel: auto-relayed as a reply for
    /// members of the thread's autoreply set, logged as chatter otherwise.
    pub async fn handle_staff_message(
        &self,
        channel: &ChannelId,
        actor: &StaffActor,
        content: &str,
        attachments: &[Attachment],
        msg_id: &MessageId,
    ) -> Result<(), CoachmailError> {
        let Some(thread) = self.registry.find_open_by_channel(channel).await? else {
            return Ok(());
        };
        let row = thread.snapshot().await?;
        if row.autoreply_users.contains(&actor.id.0) {
            thread
                .reply_to_user(actor, content, attachments, false)
                .await?;
        } else {
            thread
                .save_chat_message(actor, content, Some(msg_id.clone()))
                .await?;
        }
        Ok(())
    }

    /// A user edited a DM that was already relayed: the original stays in
    /// the transcript and a before/after note goes to staff.
    pub async fn handle_dm_edit(
        &self,
        user: &UserId,
        dm_message_id: &MessageId,
        new_content: &str,
    ) -> Result<(), CoachmailError> {
        let Some(thread) = self.registry.find_open_by_user(user).await? else {
            return Ok(());
        };
        let messages = thread.messages().await?;
        let Some(original) = messages
            .iter()
            .find(|m| m.dm_message_id.as_ref() == Some(dm_message_id))
        else {
            debug!(user = %user, "edited DM has no relayed counterpart");
            return Ok(());
        };
        thread
            .post_system_message(&format!(
                "The user edited a message.\n**Before:** {}\n**After:** {}",
                original.body, new_content
            ))
            .await?;
        Ok(())
    }

    /// Staff edited a logged channel message; the log row follows.
    pub async fn handle_staff_edit(
        &self,
        channel: &ChannelId,
        dm_message_id: &MessageId,
        new_body: &str,
    ) -> Result<bool, CoachmailError> {
        let Some(thread) = self.registry.find_by_channel(channel).await? else {
            return Ok(false);
        };
        thread.update_chat_message(dm_message_id, new_body).await
    }

    /// Staff deleted a logged channel message; the log row is removed.
    pub async fn handle_staff_delete(
        &self,
        channel: &ChannelId,
        dm_message_id: &MessageId,
    ) -> Result<bool, CoachmailError> {
        let Some(thread) = self.registry.find_by_channel(channel).await? else {
            return Ok(false);
        };
        thread.delete_chat_message(dm_message_id).await
    }

    pub async fn handle_member_left(&self, user: &UserId) -> Result<(), CoachmailError> {
        let Some(thread) = self.registry.find_open_by_user(user).await? else {
            return Ok(());
        };
        thread
            .post_system_message("The user left the community.")
            .await?;
        Ok(())
    }

    pub async fn handle_member_rejoined(&self, user: &UserId) -> Result<(), CoachmailError> {
        let Some(thread) = self.registry.find_open_by_user(user).await? else {
            return Ok(());
        };
        thread
            .post_system_message("The user rejoined the community.")
            .await?;
        Ok(())
    }
}

/// The queued intake job: relay into the open thread, or create one. The
/// triggering first message is not relayed; the survey (or quiet header)
/// opens the conversation.
async fn intake(
    registry: &ThreadRegistry,
    user: &UserRef,
    msg: &InboundMessage,
    ignore_accidental: bool,
) -> Result<(), CoachmailError> {
    if let Some(thread) = registry.find_open_by_user(&user.id).await? {
        return thread.receive_user_reply(msg).await;
    }
    if ignore_accidental && is_accidental(&msg.content) && msg.attachments.is_empty() {
        debug!(user = %user.id, "accidental DM ignored, no thread created");
        return Ok(());
    }
    registry.create(user, false, false).await?;
    Ok(())
}

fn is_accidental(content: &str) -> bool {
    let normalized = content.trim().to_lowercase();
    ACCIDENTAL_THREAD_MESSAGES
        .iter()
        .any(|phrase| *phrase == normalized)
}
