// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat gateway for deterministic testing.
//!
//! `MockGateway` implements `ChatGateway` with captured outbound traffic and
//! injectable failure modes: unreachable DMs, deleted relay channels, and
//! missing categories. Message and channel ids come from a counter so test
//! assertions can name them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use coachmail_core::types::{
    CategoryId, CommunityId, FileUpload, MemberInfo, ReactionCount, UserId,
};
use coachmail_core::{ChannelId, ChatGateway, CoachmailError, MessageId, MessageRef};

/// A captured private message.
#[derive(Debug, Clone)]
pub struct SentDm {
    pub user: UserId,
    pub content: String,
    pub file: Option<FileUpload>,
    pub msg: MessageRef,
}

/// A captured channel post.
#[derive(Debug, Clone)]
pub struct SentChannelMessage {
    pub channel: ChannelId,
    pub content: String,
    pub files: Vec<FileUpload>,
    pub msg: MessageRef,
}

#[derive(Default)]
struct GatewayState {
    next_id: u64,
    dms: Vec<SentDm>,
    channel_messages: Vec<SentChannelMessage>,
    created_channels: Vec<(String, ChannelId)>,
    deleted_channels: Vec<ChannelId>,
    parents: HashMap<ChannelId, CategoryId>,
    categories: HashMap<String, CategoryId>,
    /// Reaction tallies per message, in first-added order.
    reactions: HashMap<MessageRef, Vec<ReactionCount>>,
    pinned: Vec<MessageRef>,
    members: HashMap<(CommunityId, UserId), MemberInfo>,
    fail_dms_for: HashSet<UserId>,
    gone_channels: HashSet<ChannelId>,
    missing_categories: HashSet<CategoryId>,
}

impl GatewayState {
    fn next_message_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId(format!("msg-{}", self.next_id))
    }

    fn bump_reaction(&mut self, msg: &MessageRef, symbol: &str) {
        let tallies = self.reactions.entry(msg.clone()).or_default();
        if let Some(entry) = tallies.iter_mut().find(|t| t.symbol == symbol) {
            entry.count += 1;
        } else {
            tallies.push(ReactionCount {
                symbol: symbol.to_string(),
                count: 1,
            });
        }
    }
}

/// A mock chat platform for testing.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // --- failure injection ---

    /// Make `send_private_message` fail for this user with a delivery error.
    pub async fn fail_dms_for(&self, user: &UserId) {
        self.state.lock().await.fail_dms_for.insert(user.clone());
    }

    /// Make channel sends to this channel fail with `ChannelGone`.
    pub async fn mark_channel_gone(&self, channel: &ChannelId) {
        self.state.lock().await.gone_channels.insert(channel.clone());
    }

    /// Make this category invisible: `category_exists` reports false and
    /// `set_channel_parent` fails.
    pub async fn mark_category_missing(&self, category: &CategoryId) {
        self.state
            .lock()
            .await
            .missing_categories
            .insert(category.clone());
    }

    /// Register membership facts returned by `member_of`.
    pub async fn set_member(&self, community: &CommunityId, user: &UserId, info: MemberInfo) {
        self.state
            .lock()
            .await
            .members
            .insert((community.clone(), user.clone()), info);
    }

    /// Simulate a human reacting to a message. The bot's own seed reaction
    /// counts as 1, so one call here pushes the tally to the "answered"
    /// threshold.
    pub async fn user_react(&self, msg: &MessageRef, symbol: &str) {
        self.state.lock().await.bump_reaction(msg, symbol);
    }

    // --- captured traffic ---

    pub async fn dms(&self) -> Vec<SentDm> {
        self.state.lock().await.dms.clone()
    }

    pub async fn dms_to(&self, user: &UserId) -> Vec<SentDm> {
        self.state
            .lock()
            .await
            .dms
            .iter()
            .filter(|d| &d.user == user)
            .cloned()
            .collect()
    }

    pub async fn channel_messages(&self) -> Vec<SentChannelMessage> {
        self.state.lock().await.channel_messages.clone()
    }

    pub async fn messages_in(&self, channel: &ChannelId) -> Vec<SentChannelMessage> {
        self.state
            .lock()
            .await
            .channel_messages
            .iter()
            .filter(|m| &m.channel == channel)
            .cloned()
            .collect()
    }

    pub async fn created_channels(&self) -> Vec<(String, ChannelId)> {
        self.state.lock().await.created_channels.clone()
    }

    pub async fn deleted_channels(&self) -> Vec<ChannelId> {
        self.state.lock().await.deleted_channels.clone()
    }

    pub async fn parent_of(&self, channel: &ChannelId) -> Option<CategoryId> {
        self.state.lock().await.parents.get(channel).cloned()
    }

    /// Category previously minted by `ensure_category` under this name.
    pub async fn category_named(&self, name: &str) -> Option<CategoryId> {
        self.state.lock().await.categories.get(name).cloned()
    }

    pub async fn pinned_messages(&self) -> Vec<MessageRef> {
        self.state.lock().await.pinned.clone()
    }

    /// Symbols the bot seeded on a message, in order.
    pub async fn seeded_symbols(&self, msg: &MessageRef) -> Vec<String> {
        self.state
            .lock()
            .await
            .reactions
            .get(msg)
            .map(|tallies| tallies.iter().map(|t| t.symbol.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatGateway for MockGateway {
    async fn send_private_message(
        &self,
        user: &UserId,
        content: &str,
        file: Option<FileUpload>,
    ) -> Result<MessageRef, CoachmailError> {
        let mut state = self.state.lock().await;
        if state.fail_dms_for.contains(user) {
            return Err(CoachmailError::delivery("user has DMs closed"));
        }
        let msg = MessageRef {
            channel: ChannelId(format!("dm-{user}")),
            message: state.next_message_id(),
        };
        state.dms.push(SentDm {
            user: user.clone(),
            content: content.to_string(),
            file,
            msg: msg.clone(),
        });
        Ok(msg)
    }

    async fn send_channel_message(
        &self,
        channel: &ChannelId,
        content: &str,
        files: Vec<FileUpload>,
    ) -> Result<MessageRef, CoachmailError> {
        let mut state = self.state.lock().await;
        if state.gone_channels.contains(channel) {
            return Err(CoachmailError::ChannelGone);
        }
        let msg = MessageRef {
            channel: channel.clone(),
            message: state.next_message_id(),
        };
        state.channel_messages.push(SentChannelMessage {
            channel: channel.clone(),
            content: content.to_string(),
            files,
            msg: msg.clone(),
        });
        Ok(msg)
    }

    async fn create_channel(
        &self,
        name: &str,
        parent: Option<&CategoryId>,
    ) -> Result<ChannelId, CoachmailError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let channel = ChannelId(format!("chan-{}", state.next_id));
        state
            .created_channels
            .push((name.to_string(), channel.clone()));
        if let Some(category) = parent {
            state.parents.insert(channel.clone(), category.clone());
        }
        Ok(channel)
    }

    async fn set_channel_parent(
        &self,
        channel: &ChannelId,
        category: &CategoryId,
    ) -> Result<(), CoachmailError> {
        let mut state = self.state.lock().await;
        if state.missing_categories.contains(category) {
            return Err(CoachmailError::gateway(format!(
                "category {category} not found"
            )));
        }
        state.parents.insert(channel.clone(), category.clone());
        Ok(())
    }

    async fn channel_parent(
        &self,
        channel: &ChannelId,
    ) -> Result<Option<CategoryId>, CoachmailError> {
        Ok(self.state.lock().await.parents.get(channel).cloned())
    }

    async fn category_exists(&self, category: &CategoryId) -> Result<bool, CoachmailError> {
        Ok(!self.state.lock().await.missing_categories.contains(category))
    }

    async fn ensure_category(&self, name: &str) -> Result<CategoryId, CoachmailError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.categories.get(name) {
            return Ok(existing.clone());
        }
        state.next_id += 1;
        let category = CategoryId(format!("cat-{}", state.next_id));
        state.categories.insert(name.to_string(), category.clone());
        Ok(category)
    }

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), CoachmailError> {
        let mut state = self.state.lock().await;
        state.deleted_channels.push(channel.clone());
        state.gone_channels.insert(channel.clone());
        Ok(())
    }

    async fn add_reaction(&self, msg: &MessageRef, symbol: &str) -> Result<(), CoachmailError> {
        self.state.lock().await.bump_reaction(msg, symbol);
        Ok(())
    }

    async fn reaction_counts(
        &self,
        msg: &MessageRef,
    ) -> Result<Vec<ReactionCount>, CoachmailError> {
        Ok(self
            .state
            .lock()
            .await
            .reactions
            .get(msg)
            .cloned()
            .unwrap_or_default())
    }

    async fn pin_message(&self, msg: &MessageRef) -> Result<(), CoachmailError> {
        self.state.lock().await.pinned.push(msg.clone());
        Ok(())
    }

    async fn member_of(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<MemberInfo>, CoachmailError> {
        Ok(self
            .state
            .lock()
            .await
            .members
            .get(&(community.clone(), user.clone()))
            .cloned())
    }
}
