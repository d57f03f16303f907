// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the coachmail relay.
//!
//! This crate provides the error taxonomy, identifier and state types,
//! protocol constants, and the traits behind which the chat platform and
//! attachment storage collaborators live.

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

pub use error::CoachmailError;
pub use traits::{AttachmentStore, ChatGateway};
pub use types::{
    CategoryId, ChannelId, CommunityId, GatherState, MessageId, MessageRef, MessageType,
    ThreadStatus, UserId,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_cover_the_taxonomy() {
        let _config = CoachmailError::Config("test".into());
        let _validation = CoachmailError::Validation("test".into());
        let _delivery = CoachmailError::delivery("closed DMs");
        let _gone = CoachmailError::ChannelGone;
        let _storage = CoachmailError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _gateway = CoachmailError::gateway("missing permission");
        let _internal = CoachmailError::Internal("test".into());
    }

    #[test]
    fn delivery_error_message_is_preserved() {
        let err = CoachmailError::delivery("user blocked the bot");
        assert_eq!(err.to_string(), "delivery error: user blocked the bot");
    }

    #[test]
    fn accidental_phrases_are_lowercase() {
        for phrase in constants::ACCIDENTAL_THREAD_MESSAGES {
            assert_eq!(*phrase, phrase.to_lowercase());
        }
    }
}
