// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The gather-info intake survey.
//!
//! A reaction-driven state machine embedded in the thread: platform, rank
//! and role are answered by reacting to posted prompts, the request body is
//! free text, and a finisher validates the recorded reactions before the
//! thread is handed to staff. Transitions pattern-match on
//! [`GatherState`], so a row can never hold an impossible combination of
//! prompt ids.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use coachmail_core::constants::{CANCEL_SYMBOL, CONFIRM_SYMBOL};
use coachmail_core::types::{GatherState, MessageRef};
use coachmail_core::{CoachmailError, UserId};
use coachmail_storage::{queries, ThreadRow};

use crate::thread::Thread;
use crate::util;

/// What a reaction event did to the survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Wrong message, wrong symbol, or wrong state. No transition.
    Ignored,
    /// The survey moved to its next step.
    Advanced,
    /// The user cancelled; the close rides the intake queue.
    CancelRequested,
    /// A confirm reaction re-ran the finisher.
    FinisherRan,
}

impl Thread {
    /// Post the welcome prompt to the user, seed the platform answer
    /// reactions plus the cancel symbol, and record the prompt id.
    ///
    /// Called from onboarding and from a mid-survey restart. Errors
    /// propagate; onboarding captures them instead of failing creation.
    pub async fn post_platform_prompt(&self) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        let cfg = &self.ctx.config.gather;
        let mut symbols: Vec<&str> = cfg.platform_reactions.iter().map(String::as_str).collect();
        symbols.push(CANCEL_SYMBOL);

        let prompt = self
            .post_prompt(&row.user_id, &cfg.welcome_message, &symbols)
            .await?;
        queries::threads::set_gather(
            &self.ctx.db,
            &self.id,
            &GatherState::AwaitingPlatform {
                prompt: Some(prompt),
            },
        )
        .await
    }

    /// Reset to the first step and notify both sides.
    pub(crate) async fn restart_gather(&self, row: &ThreadRow) -> Result<(), CoachmailError> {
        let cfg = &self.ctx.config.gather;
        if let Err(e) = self
            .post_to_user(&row.user_id, &cfg.restart_message, None)
            .await
        {
            warn!(thread = %self.id, error = %e, "restart notice delivery failed");
        }
        self.post_platform_prompt().await?;
        self.post_to_channel(row, "The user restarted the intake questions.", Vec::new(), true)
            .await?;
        info!(thread = %self.id, "survey restarted");
        Ok(())
    }

    /// Cancel the survey: notify the user, drop a transcript pointer into
    /// the external log channel, and enqueue a silent close on the intake
    /// queue so it is totally ordered with thread creation.
    pub(crate) async fn cancel_gather(&self, row: &ThreadRow) -> Result<(), CoachmailError> {
        let cfg = &self.ctx.config.gather;
        if let Err(e) = self
            .post_to_user(&row.user_id, &cfg.cancel_message, None)
            .await
        {
            warn!(thread = %self.id, error = %e, "cancel notice delivery failed");
        }

        if let Some(log_channel) = &self.ctx.config.threads.log_channel {
            let pointer = match self.log_url() {
                Some(url) => format!(
                    "Coaching request cancelled by {}: {}",
                    row.user_name,
                    util::disable_link_previews(&url)
                ),
                None => format!("Coaching request cancelled by {} (thread {}).", row.user_name, self.id),
            };
            if let Err(e) = self
                .ctx
                .gateway
                .send_channel_message(
                    &coachmail_core::ChannelId(log_channel.clone()),
                    &pointer,
                    Vec::new(),
                )
                .await
            {
                warn!(thread = %self.id, error = %e, "cancel log pointer failed");
            }
        }

        let thread = self.clone();
        self.ctx.queue.push(async move {
            if let Err(e) = thread.close(true, true).await {
                warn!(thread = %thread.id, error = %e, "queued cancel close failed");
            }
        });
        info!(thread = %self.id, "survey cancelled by user");
        Ok(())
    }

    /// Route a reaction from the thread's user through the state machine.
    ///
    /// A reaction is matched against the stored prompt id for the current
    /// step and the step's symbol whitelist; anything else is ignored
    /// without error. The cancel symbol is honored on the welcome prompt at
    /// every step short of completion.
    pub async fn handle_reaction(
        &self,
        msg: &MessageRef,
        symbol: &str,
    ) -> Result<ReactionOutcome, CoachmailError> {
        let row = self.snapshot().await?;
        let cfg = &self.ctx.config.gather;

        // Cancel first: valid on the welcome prompt in any unfinished state.
        if !row.gather.is_complete()
            && util::symbol_matches(CANCEL_SYMBOL, symbol)
            && row.gather.prompts().0 == Some(msg)
        {
            self.cancel_gather(&row).await?;
            return Ok(ReactionOutcome::CancelRequested);
        }

        match &row.gather {
            GatherState::AwaitingPlatform { prompt: Some(prompt) } if prompt == msg => {
                if !whitelisted(&cfg.platform_reactions, symbol) {
                    return Ok(ReactionOutcome::Ignored);
                }
                let rank_symbols: Vec<&str> =
                    cfg.rank_reactions.iter().map(String::as_str).collect();
                let next = self
                    .post_prompt(&row.user_id, &cfg.rank_message, &rank_symbols)
                    .await?;
                queries::threads::set_gather(
                    &self.ctx.db,
                    &self.id,
                    &GatherState::AwaitingRank {
                        platform: prompt.clone(),
                        prompt: next,
                    },
                )
                .await?;
                Ok(ReactionOutcome::Advanced)
            }
            GatherState::AwaitingRank { platform, prompt } if prompt == msg => {
                if !whitelisted(&cfg.rank_reactions, symbol) {
                    return Ok(ReactionOutcome::Ignored);
                }
                let roles = self.available_roles().await?;
                let role_symbols: Vec<&str> = roles.iter().map(String::as_str).collect();
                let next = self
                    .post_prompt(&row.user_id, &cfg.role_message, &role_symbols)
                    .await?;
                queries::threads::set_gather(
                    &self.ctx.db,
                    &self.id,
                    &GatherState::AwaitingRole {
                        platform: platform.clone(),
                        rank: prompt.clone(),
                        prompt: next,
                    },
                )
                .await?;
                Ok(ReactionOutcome::Advanced)
            }
            GatherState::AwaitingRole {
                platform,
                rank,
                prompt,
            } if prompt == msg => {
                if !whitelisted(&cfg.role_reactions, symbol) {
                    return Ok(ReactionOutcome::Ignored);
                }
                self.post_to_user(&row.user_id, &cfg.request_message, None)
                    .await?;
                queries::threads::set_gather(
                    &self.ctx.db,
                    &self.id,
                    &GatherState::AwaitingRequest {
                        platform: platform.clone(),
                        rank: rank.clone(),
                        role: prompt.clone(),
                    },
                )
                .await?;
                Ok(ReactionOutcome::Advanced)
            }
            GatherState::Incomplete { .. } if util::symbol_matches(CONFIRM_SYMBOL, symbol) => {
                self.finish_gather(None).await?;
                Ok(ReactionOutcome::FinisherRan)
            }
            _ => {
                debug!(thread = %self.id, symbol, "reaction ignored by survey");
                Ok(ReactionOutcome::Ignored)
            }
        }
    }

    /// Validate the recorded reaction answers and finish the survey.
    ///
    /// `new_text` is the free-text request body when the call comes from a
    /// user message; a confirm-reaction re-run passes `None` and keeps the
    /// stored partial text.
    pub async fn finish_gather(&self, new_text: Option<&str>) -> Result<(), CoachmailError> {
        let row = self.snapshot().await?;
        let cfg = &self.ctx.config.gather;

        let (platform_prompt, rank_prompt, role_prompt, partial) = match &row.gather {
            GatherState::AwaitingRequest {
                platform,
                rank,
                role,
            } => (platform, rank, role, String::new()),
            GatherState::Incomplete {
                platform,
                rank,
                role,
                partial_request,
            } => (platform, rank, role, partial_request.clone()),
            other => {
                debug!(thread = %self.id, state = other.code(), "finisher called out of state");
                return Ok(());
            }
        };
        let request = new_text.map(str::to_string).unwrap_or(partial);

        let platform = self
            .chosen_answer(platform_prompt, &cfg.platform_reactions)
            .await?;
        let rank = self.chosen_answer(rank_prompt, &cfg.rank_reactions).await?;
        let role = self.chosen_answer(role_prompt, &cfg.role_reactions).await?;

        let (Some(platform), Some(rank), Some(role)) = (platform, rank, role) else {
            queries::threads::set_gather(
                &self.ctx.db,
                &self.id,
                &GatherState::Incomplete {
                    platform: platform_prompt.clone(),
                    rank: rank_prompt.clone(),
                    role: role_prompt.clone(),
                    partial_request: request,
                },
            )
            .await?;
            let notice = self
                .post_to_user(&row.user_id, &cfg.incomplete_message, None)
                .await?;
            if let Err(e) = self.ctx.gateway.add_reaction(&notice, CONFIRM_SYMBOL).await {
                warn!(thread = %self.id, error = %e, "confirm reaction seed failed");
            }
            info!(thread = %self.id, "survey incomplete; awaiting confirmation");
            return Ok(());
        };

        queries::threads::set_gather(&self.ctx.db, &self.id, &GatherState::Complete).await?;
        if let Err(e) = self
            .post_to_user(&row.user_id, &cfg.complete_message, None)
            .await
        {
            warn!(thread = %self.id, error = %e, "completion notice delivery failed");
        }

        let threads_cfg = &self.ctx.config.threads;
        let mention = threads_cfg
            .staff_mentions
            .get(&role)
            .unwrap_or(&threads_cfg.fallback_mention);
        let summary = format!(
            "{mention} new coaching request from **{}**\n\
             **Platform:** {platform}\n\
             **Rank:** {rank}\n\
             **Role:** {role}\n\
             **Request:** {request}",
            row.user_name
        );
        if let Some(posted) = self.post_to_channel(&row, &summary, Vec::new(), true).await? {
            if let Err(e) = self.ctx.gateway.pin_message(&posted).await {
                warn!(thread = %self.id, error = %e, "summary pin failed");
            }
        } else {
            return Ok(());
        }

        queries::threads::set_thread_role(&self.ctx.db, &self.id, &role).await?;
        self.move_to_role_category(&row, &role).await?;
        info!(thread = %self.id, %role, "survey complete");
        Ok(())
    }

    /// Role options currently under their open-thread limit. Roles with no
    /// configured limit are always available.
    pub(crate) async fn available_roles(&self) -> Result<Vec<String>, CoachmailError> {
        let cfg = &self.ctx.config;
        let counts: HashMap<String, i64> =
            queries::threads::open_counts_by_role(&self.ctx.db).await?;
        Ok(cfg
            .gather
            .role_reactions
            .iter()
            .filter(|symbol| {
                let display = util::symbol_display(symbol);
                cfg.threads.role_limits.get(display).is_none_or(|limit| {
                    counts.get(display).copied().unwrap_or(0) < *limit
                })
            })
            .cloned()
            .collect())
    }

    /// First whitelisted symbol on the prompt with a count above one, i.e.
    /// someone besides this bot reacted. Gateway reaction order is the
    /// deterministic tie-break. Returns the display name.
    async fn chosen_answer(
        &self,
        prompt: &MessageRef,
        whitelist: &[String],
    ) -> Result<Option<String>, CoachmailError> {
        let counts = self.ctx.gateway.reaction_counts(prompt).await?;
        Ok(counts
            .iter()
            .find(|r| r.count > 1 && whitelisted(whitelist, &r.symbol))
            .map(|r| util::symbol_display(&r.symbol).to_string()))
    }

    async fn move_to_role_category(
        &self,
        row: &ThreadRow,
        role: &str,
    ) -> Result<(), CoachmailError> {
        let Some(category) = self.ctx.config.threads.role_categories.get(role) else {
            return Ok(());
        };
        let category = coachmail_core::CategoryId(category.clone());
        let moved = match self.ctx.gateway.category_exists(&category).await {
            Ok(true) => self
                .ctx
                .gateway
                .set_channel_parent(&row.channel_id, &category)
                .await
                .map(|()| true),
            Ok(false) => Ok(false),
            Err(e) => Err(e),
        };
        match moved {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => {
                warn!(thread = %self.id, %role, "role category move failed");
                self.post_to_channel(
                    row,
                    &format!("Could not move this thread to the {role} category."),
                    Vec::new(),
                    true,
                )
                .await?;
                Ok(())
            }
        }
    }

    /// DM a prompt and seed its answer reactions. Individual reaction
    /// failures are logged, not fatal; the prompt itself must land.
    async fn post_prompt(
        &self,
        user: &UserId,
        content: &str,
        symbols: &[&str],
    ) -> Result<MessageRef, CoachmailError> {
        let prompt = self.post_to_user(user, content, None).await?;
        for symbol in symbols {
            if let Err(e) = self.ctx.gateway.add_reaction(&prompt, symbol).await {
                warn!(thread = %self.id, symbol, error = %e, "reaction seed failed");
            }
        }
        Ok(prompt)
    }
}

fn whitelisted(whitelist: &[String], symbol: &str) -> bool {
    whitelist.iter().any(|w| util::symbol_matches(w, symbol))
}
