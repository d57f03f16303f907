// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the relay's external collaborators.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod attachments;
pub mod gateway;

pub use attachments::AttachmentStore;
pub use gateway::ChatGateway;
