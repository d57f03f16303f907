// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-based sweeps over the thread store.
//!
//! Each function is one idempotent pass; cadence belongs to the caller
//! (nothing here owns a timer). A failure on one candidate never aborts
//! the sweep for the rest. A sweep whose timeout configuration is absent
//! or zero does nothing at all.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use coachmail_core::CoachmailError;
use coachmail_storage::{queries, ThreadRow};

use crate::context::ThreadContext;
use crate::thread::Thread;
use crate::util;

/// Close every open thread whose scheduled-close deadline has passed.
/// Returns how many threads were closed.
pub async fn close_due_threads(
    ctx: &ThreadContext,
    now: DateTime<Utc>,
) -> Result<usize, CoachmailError> {
    let due = queries::threads::due_for_close(&ctx.db, &util::ts(now)).await?;
    let mut closed = 0;
    for row in due {
        let silent = row.scheduled_close_silent;
        let thread = Thread::new(row.id, ctx.clone());
        match thread.close(false, silent).await {
            Ok(()) => closed += 1,
            Err(e) => warn!(thread = %thread.id(), error = %e, "scheduled close failed"),
        }
    }
    if closed > 0 {
        info!(closed, "scheduled-close sweep done");
    }
    Ok(closed)
}

/// Suspend every open thread whose scheduled-suspend deadline has passed.
pub async fn suspend_due_threads(
    ctx: &ThreadContext,
    now: DateTime<Utc>,
) -> Result<usize, CoachmailError> {
    let due = queries::threads::due_for_suspend(&ctx.db, &util::ts(now)).await?;
    let mut suspended = 0;
    for row in due {
        let thread = Thread::new(row.id, ctx.clone());
        match thread.suspend().await {
            Ok(()) => suspended += 1,
            Err(e) => warn!(thread = %thread.id(), error = %e, "scheduled suspend failed"),
        }
    }
    if suspended > 0 {
        info!(suspended, "scheduled-suspend sweep done");
    }
    Ok(suspended)
}

/// Send the wait-time apology to threads that have waited past the timeout
/// and are still parked in the waiting category, survey finished or not.
///
/// The category filter keeps threads already picked up by staff (and moved
/// out of the waiting area) from getting an automated apology. At-most-once
/// comes from the candidate query filtering on the apology stamp.
pub async fn apologise_waiting_threads(
    ctx: &ThreadContext,
    now: DateTime<Utc>,
) -> Result<usize, CoachmailError> {
    let cfg = &ctx.config;
    let Some(timeout) = cfg.scheduler.apology_timeout_minutes.filter(|t| *t > 0) else {
        return Ok(0);
    };
    if cfg.scheduler.apology_message.is_none() {
        return Ok(0);
    }
    let Some(waiting) = &cfg.threads.waiting_category else {
        return Ok(0);
    };

    let cutoff = util::ts(now - Duration::minutes(timeout));
    let candidates = queries::threads::awaiting_apology(&ctx.db, &cutoff).await?;
    let mut apologised = 0;
    for row in candidates {
        let parked = match ctx.gateway.channel_parent(&row.channel_id).await {
            Ok(parent) => parent.is_some_and(|p| p.0 == *waiting),
            Err(e) => {
                warn!(thread = %row.id, error = %e, "channel parent lookup failed");
                continue;
            }
        };
        if !parked {
            continue;
        }
        let thread = Thread::new(row.id, ctx.clone());
        match thread.apologise().await {
            Ok(()) => apologised += 1,
            Err(e) => warn!(thread = %thread.id(), error = %e, "apology failed"),
        }
    }
    if apologised > 0 {
        info!(apologised, "apology sweep done");
    }
    Ok(apologised)
}

/// Open threads whose survey has been unfinished for longer than the
/// configured timeout. What to do with them is the caller's decision; this
/// only produces the candidate set.
pub async fn expired_incomplete_threads(
    ctx: &ThreadContext,
    now: DateTime<Utc>,
) -> Result<Vec<ThreadRow>, CoachmailError> {
    let Some(timeout) = ctx
        .config
        .scheduler
        .gather_timeout_minutes
        .filter(|t| *t > 0)
    else {
        return Ok(Vec::new());
    };
    let cutoff = util::ts(now - Duration::minutes(timeout));
    queries::threads::expired_incomplete(&ctx.db, &cutoff).await
}
