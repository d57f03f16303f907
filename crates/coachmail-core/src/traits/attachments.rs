// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment persistence trait.

use async_trait::async_trait;

use crate::error::CoachmailError;
use crate::types::{Attachment, FileUpload};

/// Persists inbound attachments and materializes them for re-upload.
///
/// Blob storage itself is an external collaborator; the relay only needs a
/// durable URL for the transcript and, for small files, the bytes to forward
/// natively.
#[async_trait]
pub trait AttachmentStore: Send + Sync + 'static {
    /// Persist the attachment and return the durable URL for the log body.
    async fn save(&self, attachment: &Attachment) -> Result<String, CoachmailError>;

    /// Fetch the attachment contents as a forwardable file object.
    async fn to_upload(&self, attachment: &Attachment) -> Result<FileUpload, CoachmailError>;
}
