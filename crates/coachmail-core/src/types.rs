// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the coachmail workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::CoachmailError;

/// Unique identifier for an end user on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Unique identifier for a channel on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

/// Unique identifier for a message on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Unique identifier for a channel category on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub String);

/// Unique identifier for a recognized parent community.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommunityId(pub String);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_inner!(UserId, ChannelId, MessageId, CategoryId, CommunityId);

/// A delivered message, addressable for reactions and pinning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub message: MessageId,
}

/// Lifecycle status of a thread. Transitions are monotonic:
/// `Open -> {Closed | Suspended}`, `Suspended -> Open`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ThreadStatus {
    Open,
    Closed,
    Suspended,
}

impl ThreadStatus {
    /// Integer code persisted in the `threads.status` column.
    pub fn code(self) -> i64 {
        match self {
            ThreadStatus::Open => 1,
            ThreadStatus::Closed => 2,
            ThreadStatus::Suspended => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ThreadStatus::Open),
            2 => Some(ThreadStatus::Closed),
            3 => Some(ThreadStatus::Suspended),
            _ => None,
        }
    }
}

/// Kind of a transcript log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    /// Bot-authored notice posted to the relay channel.
    System,
    /// Staff chatter in the relay channel, not relayed to the user.
    Chat,
    /// User DM mirrored into the relay channel.
    FromUser,
    /// Staff reply delivered to the user.
    ToUser,
    /// Imported from a previous transcript format.
    Legacy,
    /// Command invocation, or a reply that failed delivery.
    Command,
}

impl MessageType {
    pub fn code(self) -> i64 {
        match self {
            MessageType::System => 1,
            MessageType::Chat => 2,
            MessageType::FromUser => 3,
            MessageType::ToUser => 4,
            MessageType::Legacy => 5,
            MessageType::Command => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(MessageType::System),
            2 => Some(MessageType::Chat),
            3 => Some(MessageType::FromUser),
            4 => Some(MessageType::ToUser),
            5 => Some(MessageType::Legacy),
            6 => Some(MessageType::Command),
            _ => None,
        }
    }
}

/// The intake survey state machine, as a tagged enum so that each state
/// carries exactly the prompt correlation keys that can exist in it.
///
/// The deterministic step order is platform -> rank -> role -> request.
/// State only advances, except for an explicit user-triggered restart back
/// to [`GatherState::AwaitingPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatherState {
    /// First step. The prompt ref is absent only when posting the prompt
    /// failed during onboarding; a restart re-posts it.
    AwaitingPlatform { prompt: Option<MessageRef> },
    AwaitingRank {
        platform: MessageRef,
        prompt: MessageRef,
    },
    AwaitingRole {
        platform: MessageRef,
        rank: MessageRef,
        prompt: MessageRef,
    },
    /// All three prompts answered by reaction; the next free-text DM is the
    /// request body.
    AwaitingRequest {
        platform: MessageRef,
        rank: MessageRef,
        role: MessageRef,
    },
    /// The finisher found at least one unanswered prompt; waiting for the
    /// user to confirm completion with the checkmark reaction.
    Incomplete {
        platform: MessageRef,
        rank: MessageRef,
        role: MessageRef,
        partial_request: String,
    },
    Complete,
}

impl GatherState {
    /// Ordinal persisted in the `threads.gather_state` column. `Incomplete`
    /// sorts below the awaiting steps so that "survey not finished" is a
    /// single `< COMPLETE` range query.
    pub fn code(&self) -> i64 {
        match self {
            GatherState::Incomplete { .. } => 0,
            GatherState::AwaitingPlatform { .. } => 1,
            GatherState::AwaitingRank { .. } => 2,
            GatherState::AwaitingRole { .. } => 3,
            GatherState::AwaitingRequest { .. } => 4,
            GatherState::Complete => 99,
        }
    }

    /// Code of the terminal state, for range queries.
    pub const COMPLETE_CODE: i64 = 99;

    pub fn is_complete(&self) -> bool {
        matches!(self, GatherState::Complete)
    }

    /// The per-step prompt message ids, in (platform, rank, role) order.
    pub fn prompts(&self) -> (Option<&MessageRef>, Option<&MessageRef>, Option<&MessageRef>) {
        match self {
            GatherState::AwaitingPlatform { prompt } => (prompt.as_ref(), None, None),
            GatherState::AwaitingRank { platform, prompt } => {
                (Some(platform), Some(prompt), None)
            }
            GatherState::AwaitingRole {
                platform,
                rank,
                prompt,
            } => (Some(platform), Some(rank), Some(prompt)),
            GatherState::AwaitingRequest {
                platform,
                rank,
                role,
            }
            | GatherState::Incomplete {
                platform,
                rank,
                role,
                ..
            } => (Some(platform), Some(rank), Some(role)),
            GatherState::Complete => (None, None, None),
        }
    }

    /// Encode into the row columns
    /// `(gather_state, platform_msg, rank_msg, choice_msg, request_text)`.
    ///
    /// Prompt refs are stored as `channel:message` pairs so a reaction scan
    /// can address the original message later.
    pub fn encode(
        &self,
    ) -> (
        i64,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
    ) {
        let enc = |m: Option<&MessageRef>| m.map(|r| format!("{}:{}", r.channel, r.message));
        let (platform, rank, role) = self.prompts();
        let request = match self {
            GatherState::Incomplete {
                partial_request, ..
            } => Some(partial_request.clone()),
            _ => None,
        };
        (self.code(), enc(platform), enc(rank), enc(role), request)
    }

    /// Decode from the row columns. Rejects combinations the tagged enum
    /// cannot represent (e.g. an `AwaitingRank` row with no rank prompt id).
    pub fn decode(
        code: i64,
        platform: Option<String>,
        rank: Option<String>,
        role: Option<String>,
        request: Option<String>,
    ) -> Result<Self, CoachmailError> {
        fn parse(raw: Option<String>, what: &str) -> Result<MessageRef, CoachmailError> {
            let raw = raw.ok_or_else(|| {
                CoachmailError::Internal(format!("gather state row missing {what} prompt id"))
            })?;
            let (channel, message) = raw.split_once(':').ok_or_else(|| {
                CoachmailError::Internal(format!("malformed {what} prompt ref: {raw}"))
            })?;
            Ok(MessageRef {
                channel: ChannelId(channel.to_string()),
                message: MessageId(message.to_string()),
            })
        }

        match code {
            0 => Ok(GatherState::Incomplete {
                platform: parse(platform, "platform")?,
                rank: parse(rank, "rank")?,
                role: parse(role, "role")?,
                partial_request: request.unwrap_or_default(),
            }),
            1 => Ok(GatherState::AwaitingPlatform {
                prompt: match platform {
                    Some(raw) => Some(parse(Some(raw), "platform")?),
                    None => None,
                },
            }),
            2 => Ok(GatherState::AwaitingRank {
                platform: parse(platform, "platform")?,
                prompt: parse(rank, "rank")?,
            }),
            3 => Ok(GatherState::AwaitingRole {
                platform: parse(platform, "platform")?,
                rank: parse(rank, "rank")?,
                prompt: parse(role, "role")?,
            }),
            4 => Ok(GatherState::AwaitingRequest {
                platform: parse(platform, "platform")?,
                rank: parse(rank, "rank")?,
                role: parse(role, "role")?,
            }),
            99 => Ok(GatherState::Complete),
            other => Err(CoachmailError::Internal(format!(
                "unknown gather state code {other}"
            ))),
        }
    }
}

/// A user as seen by the registry: identity plus the registration timestamp
/// needed for the account-age gate.
#[derive(Debug, Clone)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
    pub registered_at: DateTime<Utc>,
}

/// A staff member acting on a thread.
#[derive(Debug, Clone)]
pub struct StaffActor {
    pub id: UserId,
    pub name: String,
    pub nickname: Option<String>,
    /// Highest hoisted role name, substituted for the username in anonymous
    /// replies.
    pub primary_role: Option<String>,
}

/// Membership facts for one recognized community, gathered at thread
/// creation time only and never refreshed.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub community: CommunityId,
    pub community_name: String,
    pub nickname: String,
    pub joined_at: DateTime<Utc>,
    pub voice_channel: Option<String>,
    pub roles: Vec<String>,
}

/// An inbound file reference attached to a user or staff message.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub size_bytes: u64,
    pub url: String,
}

/// A file object ready to be forwarded through the gateway.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// An inbound private message from the chat platform.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: MessageId,
    pub author: UserRef,
    pub content: String,
    /// Number of rich embeds; embeds-only messages render as a placeholder.
    pub embed_count: u32,
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

/// Reaction tally for one symbol on a message. The count includes the bot's
/// own seed reaction, so a human answer shows as `count > 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionCount {
    pub symbol: String,
    pub count: u32,
}
