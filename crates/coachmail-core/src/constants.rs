// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed protocol constants shared across the relay.

/// Reaction symbol that cancels the intake survey at the platform step.
pub const CANCEL_SYMBOL: &str = "\u{274c}"; // ❌

/// Reaction symbol that confirms an incomplete survey as done.
pub const CONFIRM_SYMBOL: &str = "\u{2705}"; // ✅

/// Maximum message length accepted by the chat platform; longer content is
/// split into chunks of this size.
pub const MESSAGE_CHUNK_LEN: usize = 2000;

/// Placeholder body for inbound messages that carry only rich embeds.
pub const EMBEDS_ONLY_PLACEHOLDER: &str = "<message contains embeds>";

/// Phrases that should not open a new thread when sent as a first DM
/// (compared trimmed and lowercased).
pub const ACCIDENTAL_THREAD_MESSAGES: &[&str] = &[
    "ok",
    "okay",
    "thanks",
    "ty",
    "k",
    "kk",
    "thank you",
    "thanx",
    "thnx",
    "thx",
    "tnx",
    "ok thank you",
    "ok thanks",
    "ok ty",
    "ok thanx",
    "ok thnx",
    "ok thx",
    "ok no problem",
    "ok np",
    "okay thank you",
    "okay thanks",
    "okay ty",
    "okay thanx",
    "okay thnx",
    "okay thx",
    "okay no problem",
    "okay np",
    "cheers",
];
