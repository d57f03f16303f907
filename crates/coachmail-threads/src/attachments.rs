// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment relay helper.
//!
//! Every inbound attachment is persisted for the transcript; small ones are
//! additionally materialized as native uploads so the other side gets the
//! file itself rather than a link.

use coachmail_config::model::RelayConfig;
use coachmail_core::types::{Attachment, FileUpload};
use coachmail_core::{AttachmentStore, CoachmailError};
use tracing::warn;

/// One relayed attachment: the durable link block for log bodies and, for
/// small files, the bytes to forward natively.
#[derive(Debug, Clone)]
pub struct RelayedAttachment {
    pub url: String,
    pub formatted: String,
    pub upload: Option<FileUpload>,
}

/// Persist an attachment and decide how to forward it.
///
/// A failed native fetch degrades to link-only rather than failing the
/// relay; a failed save propagates because the transcript would otherwise
/// lose the file entirely.
pub async fn relay_attachment(
    store: &dyn AttachmentStore,
    relay: &RelayConfig,
    attachment: &Attachment,
) -> Result<RelayedAttachment, CoachmailError> {
    let url = store.save(attachment).await?;
    let formatted = format!(
        "**Attachment:** {} ({})\n{}",
        attachment.filename,
        format_size(attachment.size_bytes),
        url
    );

    let upload = if relay.relay_small_attachments && attachment.size_bytes <= relay.small_attachment_bytes
    {
        match store.to_upload(attachment).await {
            Ok(upload) => Some(upload),
            Err(e) => {
                warn!(
                    filename = %attachment.filename,
                    error = %e,
                    "attachment fetch failed; relaying link only"
                );
                None
            }
        }
    } else {
        None
    };

    Ok(RelayedAttachment {
        url,
        formatted,
        upload,
    })
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_render_in_the_right_unit() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2.0KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0MB");
    }
}
