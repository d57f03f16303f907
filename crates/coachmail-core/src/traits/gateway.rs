// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-platform gateway trait.
//!
//! The gateway is an out-of-scope collaborator: the relay core only depends
//! on this seam. Error contract: [`CoachmailError::Delivery`] from
//! [`ChatGateway::send_private_message`] means the user's DMs are
//! unreachable; [`CoachmailError::ChannelGone`] from
//! [`ChatGateway::send_channel_message`] means the relay channel was deleted
//! out from under the thread, which callers treat as "auto-close silently".

use async_trait::async_trait;

use crate::error::CoachmailError;
use crate::types::{
    CategoryId, ChannelId, CommunityId, FileUpload, MemberInfo, MessageRef, ReactionCount, UserId,
};

/// Operations the relay core needs from the chat platform.
#[async_trait]
pub trait ChatGateway: Send + Sync + 'static {
    /// Deliver a message to the user's private channel.
    async fn send_private_message(
        &self,
        user: &UserId,
        content: &str,
        file: Option<FileUpload>,
    ) -> Result<MessageRef, CoachmailError>;

    /// Post a message to a channel on the staff side.
    async fn send_channel_message(
        &self,
        channel: &ChannelId,
        content: &str,
        files: Vec<FileUpload>,
    ) -> Result<MessageRef, CoachmailError>;

    /// Create a relay channel, optionally under a category.
    async fn create_channel(
        &self,
        name: &str,
        parent: Option<&CategoryId>,
    ) -> Result<ChannelId, CoachmailError>;

    /// Move a channel under a category.
    async fn set_channel_parent(
        &self,
        channel: &ChannelId,
        category: &CategoryId,
    ) -> Result<(), CoachmailError>;

    /// Current parent category of a channel, if any.
    async fn channel_parent(
        &self,
        channel: &ChannelId,
    ) -> Result<Option<CategoryId>, CoachmailError>;

    /// Whether a category currently exists.
    async fn category_exists(&self, category: &CategoryId) -> Result<bool, CoachmailError>;

    /// Category with this name, created on demand when absent.
    async fn ensure_category(&self, name: &str) -> Result<CategoryId, CoachmailError>;

    /// Best-effort channel deletion.
    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), CoachmailError>;

    /// Add a reaction to a message (used to seed survey answer options).
    async fn add_reaction(&self, msg: &MessageRef, symbol: &str) -> Result<(), CoachmailError>;

    /// Reaction tallies on a message, in the order the reactions were first
    /// added. The stable order makes "first qualifying symbol wins"
    /// deterministic for the survey finisher.
    async fn reaction_counts(
        &self,
        msg: &MessageRef,
    ) -> Result<Vec<ReactionCount>, CoachmailError>;

    /// Pin a message in its channel.
    async fn pin_message(&self, msg: &MessageRef) -> Result<(), CoachmailError>;

    /// Membership facts for a user in a recognized community, or `None` if
    /// the user is not visible there.
    async fn member_of(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<MemberInfo>, CoachmailError>;
}
