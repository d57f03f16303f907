// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the coachmail relay core.

use thiserror::Error;

/// The primary error type used across the coachmail workspace.
///
/// Boundary handling follows a fixed policy: `Validation` and `Delivery` are
/// caught where they arise and turned into user/staff-facing messages,
/// `ChannelGone` triggers an automatic silent thread closure, and `Storage`
/// propagates to the caller because a failed write means the operation's
/// effects are not durable.
#[derive(Debug, Error)]
pub enum CoachmailError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected input: bad survey answer, out-of-range subscription timeout,
    /// duplicate-open-thread attempt.
    #[error("validation error: {0}")]
    Validation(String),

    /// Could not reach the user's private channel (blocked bot, closed DMs).
    #[error("delivery error: {message}")]
    Delivery { message: String },

    /// The relay channel no longer exists on the chat platform.
    #[error("relay channel no longer exists")]
    ChannelGone,

    /// Persistence failure (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Other chat-platform failures (permissions, missing resources).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoachmailError {
    /// Shorthand for a [`CoachmailError::Delivery`] with the given message.
    pub fn delivery(message: impl Into<String>) -> Self {
        CoachmailError::Delivery {
            message: message.into(),
        }
    }

    /// Shorthand for a [`CoachmailError::Gateway`] with no source.
    pub fn gateway(message: impl Into<String>) -> Self {
        CoachmailError::Gateway {
            message: message.into(),
            source: None,
        }
    }
}
