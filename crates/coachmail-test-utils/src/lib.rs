// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic mock collaborators for coachmail integration tests.

pub mod mock_attachments;
pub mod mock_gateway;

pub use mock_attachments::MemoryAttachmentStore;
pub use mock_gateway::{MockGateway, SentChannelMessage, SentDm};
