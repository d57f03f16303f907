// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread lookup and creation.
//!
//! The registry owns the one-open-thread-per-user invariant: `find_or_create`
//! is the safe entry point and must run on the intake queue; `create` is the
//! unsafe primitive that rejects duplicates but cannot prevent races on its
//! own.

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use coachmail_core::types::{GatherState, MemberInfo, UserRef};
use coachmail_core::{CategoryId, ChannelId, CoachmailError, CommunityId, UserId};
use coachmail_storage::{queries, ThreadRow};

use crate::context::ThreadContext;
use crate::thread::Thread;
use crate::util;

pub struct ThreadRegistry {
    ctx: ThreadContext,
}

impl ThreadRegistry {
    pub fn new(ctx: ThreadContext) -> Self {
        Self { ctx }
    }

    /// The user's open thread, or a newly created one. Gate denials yield
    /// `Ok(None)`.
    pub async fn find_or_create(&self, user: &UserRef) -> Result<Option<Thread>, CoachmailError> {
        if let Some(row) = queries::threads::find_open_by_user(&self.ctx.db, &user.id).await? {
            return Ok(Some(Thread::new(row.id, self.ctx.clone())));
        }
        self.create(user, false, false).await
    }

    /// Open a new thread for the user.
    ///
    /// `quiet` skips the intake survey entirely; `ignore_requirements` skips
    /// the age and tenure gates (staff-initiated threads). Gate denials
    /// return `Ok(None)` after an optional denial DM. Once the row exists,
    /// onboarding messaging failures are collected into a single system note
    /// and never roll the thread back.
    pub async fn create(
        &self,
        user: &UserRef,
        quiet: bool,
        ignore_requirements: bool,
    ) -> Result<Option<Thread>, CoachmailError> {
        if queries::threads::find_open_by_user(&self.ctx.db, &user.id)
            .await?
            .is_some()
        {
            return Err(CoachmailError::Validation(format!(
                "user {} already has an open thread",
                user.id
            )));
        }

        // Membership facts feed both the tenure gate and the header, read
        // once at creation time and never refreshed.
        let members = self.member_infos(&user.id).await;

        if !ignore_requirements && !self.pass_gates(user, &members).await? {
            return Ok(None);
        }

        let channel = self.create_relay_channel(user, &members).await?;

        let id = Uuid::new_v4().to_string();
        let gather = if quiet {
            GatherState::Complete
        } else {
            GatherState::AwaitingPlatform { prompt: None }
        };
        let row = ThreadRow::new_open(
            id.clone(),
            user.id.clone(),
            user.name.clone(),
            channel,
            util::now_ts(),
            gather,
        );
        queries::threads::insert_thread(&self.ctx.db, &row).await?;
        let thread = Thread::new(id, self.ctx.clone());
        info!(thread = %thread.id(), user = %user.id, quiet, "thread created");

        let mut issues: Vec<String> = Vec::new();

        if !quiet
            && let Err(e) = thread.post_platform_prompt().await
        {
            warn!(thread = %thread.id(), error = %e, "survey kickoff failed");
            issues.push(format!("intake survey could not be started: {e}"));
        }

        let header = self.header_text(user, &members);
        if let Err(e) = thread.post_system_message(&header).await {
            warn!(thread = %thread.id(), error = %e, "header post failed");
            issues.push(format!("thread header could not be posted: {e}"));
        }

        if !issues.is_empty()
            && let Err(e) = thread
                .post_system_message(&format!("Onboarding issues: {}", issues.join("; ")))
                .await
        {
            warn!(thread = %thread.id(), error = %e, "issue note post failed");
        }

        Ok(Some(thread))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Thread>, CoachmailError> {
        Ok(queries::threads::find_by_id(&self.ctx.db, id)
            .await?
            .map(|row| Thread::new(row.id, self.ctx.clone())))
    }

    pub async fn find_open_by_user(
        &self,
        user: &UserId,
    ) -> Result<Option<Thread>, CoachmailError> {
        Ok(queries::threads::find_open_by_user(&self.ctx.db, user)
            .await?
            .map(|row| Thread::new(row.id, self.ctx.clone())))
    }

    /// Open or suspended thread behind a relay channel.
    pub async fn find_by_channel(
        &self,
        channel: &ChannelId,
    ) -> Result<Option<Thread>, CoachmailError> {
        Ok(queries::threads::find_by_channel(&self.ctx.db, channel)
            .await?
            .map(|row| Thread::new(row.id, self.ctx.clone())))
    }

    pub async fn find_open_by_channel(
        &self,
        channel: &ChannelId,
    ) -> Result<Option<Thread>, CoachmailError> {
        Ok(queries::threads::find_open_by_channel(&self.ctx.db, channel)
            .await?
            .map(|row| Thread::new(row.id, self.ctx.clone())))
    }

    pub async fn find_suspended_by_channel(
        &self,
        channel: &ChannelId,
    ) -> Result<Option<Thread>, CoachmailError> {
        Ok(
            queries::threads::find_suspended_by_channel(&self.ctx.db, channel)
                .await?
                .map(|row| Thread::new(row.id, self.ctx.clone())),
        )
    }

    /// Closed-thread history for a user, newest first.
    pub async fn closed_threads_by_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<ThreadRow>, CoachmailError> {
        queries::threads::closed_by_user(&self.ctx.db, user).await
    }

    pub async fn closed_thread_count_by_user(
        &self,
        user: &UserId,
    ) -> Result<i64, CoachmailError> {
        queries::threads::closed_count_by_user(&self.ctx.db, user).await
    }

    /// Whether a role tag still has room under its configured open-thread
    /// limit. Roles without a limit always have room.
    pub async fn role_capacity_open(&self, role: &str) -> Result<bool, CoachmailError> {
        let Some(limit) = self.ctx.config.threads.role_limits.get(role) else {
            return Ok(true);
        };
        let counts = queries::threads::open_counts_by_role(&self.ctx.db).await?;
        Ok(counts.get(role).copied().unwrap_or(0) < *limit)
    }

    async fn member_infos(&self, user: &UserId) -> Vec<MemberInfo> {
        let mut members = Vec::new();
        for community in &self.ctx.config.threads.communities {
            let community = CommunityId(community.clone());
            match self.ctx.gateway.member_of(&community, user).await {
                Ok(Some(info)) => members.push(info),
                Ok(None) => {}
                Err(e) => {
                    warn!(%community, %user, error = %e, "membership lookup failed");
                }
            }
        }
        members
    }

    /// Both gates deny by returning `false`; absence of membership data
    /// passes the tenure gate.
    async fn pass_gates(
        &self,
        user: &UserRef,
        members: &[MemberInfo],
    ) -> Result<bool, CoachmailError> {
        let cfg = &self.ctx.config.threads;
        let now = Utc::now();

        if let Some(min_hours) = cfg.required_account_age_hours
            && min_hours > 0
            && now - user.registered_at < Duration::hours(min_hours)
        {
            info!(user = %user.id, "thread denied: account too new");
            self.deny(user, cfg.account_age_denied_message.as_deref())
                .await;
            return Ok(false);
        }

        if let Some(min_minutes) = cfg.required_time_on_server_minutes
            && min_minutes > 0
            && !members.is_empty()
            && members
                .iter()
                .all(|m| now - m.joined_at < Duration::minutes(min_minutes))
        {
            info!(user = %user.id, "thread denied: tenure too short");
            self.deny(user, cfg.time_on_server_denied_message.as_deref())
                .await;
            return Ok(false);
        }

        Ok(true)
    }

    async fn deny(&self, user: &UserRef, message: Option<&str>) {
        let Some(message) = message else { return };
        if let Err(e) = self
            .ctx
            .gateway
            .send_private_message(&user.id, message, None)
            .await
        {
            warn!(user = %user.id, error = %e, "denial DM failed");
        }
    }

    async fn create_relay_channel(
        &self,
        user: &UserRef,
        members: &[MemberInfo],
    ) -> Result<ChannelId, CoachmailError> {
        let name = util::slug_with_id(&user.name, &user.id.0);
        let category = self.pick_category(members).await;
        self.ctx
            .gateway
            .create_channel(&name, category.as_ref())
            .await
    }

    /// Category priority: per-community override for a community the user is
    /// in, then the global default, then none. A configured category that no
    /// longer exists falls through to the next choice.
    async fn pick_category(&self, members: &[MemberInfo]) -> Option<CategoryId> {
        let cfg = &self.ctx.config.threads;
        let mut candidates: Vec<&String> = members
            .iter()
            .filter_map(|m| cfg.community_categories.get(&m.community.0))
            .collect();
        if let Some(default) = &cfg.new_thread_category {
            candidates.push(default);
        }
        for candidate in candidates {
            let category = CategoryId(candidate.clone());
            match self.ctx.gateway.category_exists(&category).await {
                Ok(true) => return Some(category),
                Ok(false) => {
                    warn!(%category, "configured thread category does not exist");
                }
                Err(e) => {
                    warn!(%category, error = %e, "category lookup failed");
                }
            }
        }
        None
    }

    fn header_text(&self, user: &UserRef, members: &[MemberInfo]) -> String {
        let cfg = &self.ctx.config.threads;
        let age = util::humanize_age(user.registered_at, Utc::now());
        let mut header = format!(
            "**{}** (id {}) registered {} ago.",
            user.name, user.id, age
        );
        if cfg.mention_user_in_header {
            header.push(' ');
            header.push_str(&util::mention(&user.id));
        }
        for m in members {
            header.push_str(&format!(
                "\n**{}**: nickname {}, member for {}",
                m.community_name,
                m.nickname,
                util::humanize_age(m.joined_at, Utc::now()),
            ));
            if let Some(voice) = &m.voice_channel {
                header.push_str(&format!(", in voice: {voice}"));
            }
            if cfg.roles_in_header && !m.roles.is_empty() {
                header.push_str(&format!(", roles: {}", m.roles.join(", ")));
            }
        }
        header
    }
}
