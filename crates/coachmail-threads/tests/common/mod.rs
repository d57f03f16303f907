// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared harness: a real SQLite store in a temp dir wired to the mock
//! gateway and attachment store.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use coachmail_config::CoachmailConfig;
use coachmail_core::types::{Attachment, InboundMessage, StaffActor, UserRef};
use coachmail_core::{MessageId, UserId};
use coachmail_storage::Database;
use coachmail_test_utils::{MemoryAttachmentStore, MockGateway};
use coachmail_threads::ThreadContext;

pub struct Harness {
    pub gateway: MockGateway,
    pub store: MemoryAttachmentStore,
    pub ctx: ThreadContext,
    _dir: TempDir,
}

pub async fn harness() -> Harness {
    harness_with(CoachmailConfig::default()).await
}

pub async fn harness_with(config: CoachmailConfig) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("coachmail.db");
    let db = Database::open(path.to_str().expect("utf-8 temp path"))
        .await
        .expect("open database");
    let gateway = MockGateway::new();
    let store = MemoryAttachmentStore::new();
    let ctx = ThreadContext::new(
        Arc::new(gateway.clone()),
        Arc::new(store.clone()),
        db,
        Arc::new(config),
    );
    Harness {
        gateway,
        store,
        ctx,
        _dir: dir,
    }
}

pub fn user(id: &str, name: &str) -> UserRef {
    UserRef {
        id: UserId(id.to_string()),
        name: name.to_string(),
        registered_at: Utc::now() - Duration::days(30),
    }
}

pub fn staff(id: &str, name: &str) -> StaffActor {
    StaffActor {
        id: UserId(id.to_string()),
        name: name.to_string(),
        nickname: None,
        primary_role: Some("Coach".to_string()),
    }
}

pub fn dm(id: &str, author: &UserRef, content: &str) -> InboundMessage {
    InboundMessage {
        id: MessageId(id.to_string()),
        author: author.clone(),
        content: content.to_string(),
        embed_count: 0,
        attachments: Vec::new(),
        timestamp: Utc::now(),
    }
}

pub fn attachment(filename: &str, size_bytes: u64) -> Attachment {
    Attachment {
        filename: filename.to_string(),
        size_bytes,
        url: format!("https://cdn.example/{filename}"),
    }
}
