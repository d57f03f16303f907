// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread lifecycle, message relay, intake survey, and scheduler sweeps.
//!
//! The relay core: [`ThreadRegistry`] finds or creates threads and runs
//! onboarding, [`Thread`] owns all per-conversation operations,
//! [`MailEngine`] is the inbound event surface a platform front end drives,
//! and [`sweeps`] holds the pull-based time-window passes. New-DM handling
//! is serialized through [`IntakeQueue`]; everything else writes directly
//! against the store by thread id.

pub mod attachments;
pub mod context;
pub mod engine;
pub mod gather;
pub mod queue;
pub mod registry;
pub mod sweeps;
pub mod thread;
pub mod util;

pub use context::ThreadContext;
pub use engine::MailEngine;
pub use gather::ReactionOutcome;
pub use queue::IntakeQueue;
pub use registry::ThreadRegistry;
pub use thread::Thread;
