// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory attachment store for testing.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use coachmail_core::types::{Attachment, FileUpload};
use coachmail_core::{AttachmentStore, CoachmailError};

/// Attachment store that records saves and fabricates upload bytes.
#[derive(Clone, Default)]
pub struct MemoryAttachmentStore {
    saved: Arc<Mutex<Vec<Attachment>>>,
    fail_for: Arc<Mutex<HashSet<String>>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `save` and `to_upload` fail for this filename.
    pub async fn fail_for(&self, filename: &str) {
        self.fail_for.lock().await.insert(filename.to_string());
    }

    /// Attachments that were persisted, in order.
    pub async fn saved(&self) -> Vec<Attachment> {
        self.saved.lock().await.clone()
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn save(&self, attachment: &Attachment) -> Result<String, CoachmailError> {
        if self.fail_for.lock().await.contains(&attachment.filename) {
            return Err(CoachmailError::gateway(format!(
                "attachment store unavailable for {}",
                attachment.filename
            )));
        }
        self.saved.lock().await.push(attachment.clone());
        Ok(format!("stored://attachments/{}", attachment.filename))
    }

    async fn to_upload(&self, attachment: &Attachment) -> Result<FileUpload, CoachmailError> {
        if self.fail_for.lock().await.contains(&attachment.filename) {
            return Err(CoachmailError::gateway(format!(
                "attachment fetch failed for {}",
                attachment.filename
            )));
        }
        Ok(FileUpload {
            filename: attachment.filename.clone(),
            data: attachment.filename.as_bytes().to_vec(),
        })
    }
}
