// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared dependency bundle for the relay core.
//!
//! Collaborators and configuration are injected once at startup and treated
//! as immutable afterwards; nothing in the core reaches for globals.

use std::sync::Arc;

use coachmail_config::CoachmailConfig;
use coachmail_core::{AttachmentStore, ChatGateway};
use coachmail_storage::Database;

use crate::queue::IntakeQueue;

/// Everything a thread operation needs: the platform gateway, attachment
/// store, database handle, configuration, and the intake queue.
///
/// Cheap to clone; all members are shared handles.
#[derive(Clone)]
pub struct ThreadContext {
    pub gateway: Arc<dyn ChatGateway>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub db: Database,
    pub config: Arc<CoachmailConfig>,
    pub queue: Arc<IntakeQueue>,
}

impl ThreadContext {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        attachments: Arc<dyn AttachmentStore>,
        db: Database,
        config: Arc<CoachmailConfig>,
    ) -> Self {
        Self {
            gateway,
            attachments,
            db,
            config,
            queue: IntakeQueue::spawn(),
        }
    }
}
