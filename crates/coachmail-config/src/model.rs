// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the coachmail relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level coachmail configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoachmailConfig {
    /// Thread creation, gating, and category settings.
    #[serde(default)]
    pub threads: ThreadsConfig,

    /// Intake survey prompts and reaction whitelists.
    #[serde(default)]
    pub gather: GatherConfig,

    /// Message relay behavior.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Time-based sweep settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Thread creation and inbox settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadsConfig {
    /// Recognized parent communities, in gate/category priority order.
    #[serde(default)]
    pub communities: Vec<String>,

    /// Minimum account age (hours since platform registration) before a new
    /// thread may be opened. `None` disables the gate.
    #[serde(default)]
    pub required_account_age_hours: Option<i64>,

    /// Optional denial DM for the account-age gate.
    #[serde(default)]
    pub account_age_denied_message: Option<String>,

    /// Minimum tenure (minutes) on at least one recognized community.
    /// `None` disables the gate; a user visible in no community passes.
    #[serde(default)]
    pub required_time_on_server_minutes: Option<i64>,

    /// Optional denial DM for the tenure gate.
    #[serde(default)]
    pub time_on_server_denied_message: Option<String>,

    /// Default category for new relay channels.
    #[serde(default)]
    pub new_thread_category: Option<String>,

    /// Per-community category overrides, keyed by community id. Takes
    /// priority over `new_thread_category` for users seen in that community.
    #[serde(default)]
    pub community_categories: HashMap<String, String>,

    /// Category holding threads not yet picked up by staff; the apology
    /// sweep only touches threads parented here.
    #[serde(default)]
    pub waiting_category: Option<String>,

    /// Role tag -> category the relay channel moves to on survey completion.
    #[serde(default)]
    pub role_categories: HashMap<String, String>,

    /// Role tag -> maximum concurrently open threads carrying that tag.
    /// Roles over their limit are hidden from the survey's role prompt.
    #[serde(default)]
    pub role_limits: HashMap<String, i64>,

    /// Role tag -> staff mention string for the completed-survey summary.
    #[serde(default)]
    pub staff_mentions: HashMap<String, String>,

    /// Fallback mention when no per-role mention is configured.
    #[serde(default = "default_fallback_mention")]
    pub fallback_mention: String,

    /// Prefer staff nicknames over usernames in replies.
    #[serde(default = "default_true")]
    pub use_nicknames: bool,

    /// Name substituted for the staff member in anonymous replies when they
    /// hold no displayable role.
    #[serde(default = "default_anonymous_name")]
    pub anonymous_name: String,

    /// Prefix relayed messages with an `[HH:MM]` timestamp.
    #[serde(default)]
    pub thread_timestamps: bool,

    /// Drop first DMs that match the accidental-message phrase list instead
    /// of opening a thread.
    #[serde(default = "default_true")]
    pub ignore_accidental_threads: bool,

    /// Include a user mention next to the id in the thread header.
    #[serde(default)]
    pub mention_user_in_header: bool,

    /// Include community role names in the thread header.
    #[serde(default = "default_true")]
    pub roles_in_header: bool,

    /// Channel receiving external log pointers (e.g. survey cancellations).
    #[serde(default)]
    pub log_channel: Option<String>,

    /// Base URL of the transcript viewer; thread log URLs are
    /// `{base}/logs/{thread_id}`.
    #[serde(default)]
    pub log_url_base: Option<String>,
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            communities: Vec::new(),
            required_account_age_hours: None,
            account_age_denied_message: None,
            required_time_on_server_minutes: None,
            time_on_server_denied_message: None,
            new_thread_category: None,
            community_categories: HashMap::new(),
            waiting_category: None,
            role_categories: HashMap::new(),
            role_limits: HashMap::new(),
            staff_mentions: HashMap::new(),
            fallback_mention: default_fallback_mention(),
            use_nicknames: default_true(),
            anonymous_name: default_anonymous_name(),
            thread_timestamps: false,
            ignore_accidental_threads: default_true(),
            mention_user_in_header: false,
            roles_in_header: default_true(),
            log_channel: None,
            log_url_base: None,
        }
    }
}

fn default_fallback_mention() -> String {
    "@here".to_string()
}

fn default_anonymous_name() -> String {
    "Staff".to_string()
}

fn default_true() -> bool {
    true
}

/// Intake survey prompts and reaction whitelists.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatherConfig {
    /// First DM after thread creation; doubles as the platform prompt the
    /// answer reactions are attached to.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// Rank prompt, posted after a platform answer.
    #[serde(default = "default_rank_message")]
    pub rank_message: String,

    /// Role prompt, posted after a rank answer. Only roles with open
    /// capacity get their reaction attached.
    #[serde(default = "default_role_message")]
    pub role_message: String,

    /// Free-text request prompt, posted after a role answer.
    #[serde(default = "default_request_message")]
    pub request_message: String,

    /// Sent when the user types "restart" mid-survey.
    #[serde(default = "default_restart_message")]
    pub restart_message: String,

    /// Sent when the user cancels the survey.
    #[serde(default = "default_cancel_message")]
    pub cancel_message: String,

    /// Sent when the finisher finds unanswered prompts.
    #[serde(default = "default_incomplete_message")]
    pub incomplete_message: String,

    /// Sent when the survey completes.
    #[serde(default = "default_complete_message")]
    pub complete_message: String,

    /// Acceptable reaction symbols for the platform step.
    #[serde(default = "default_platform_reactions")]
    pub platform_reactions: Vec<String>,

    /// Acceptable reaction symbols for the rank step.
    #[serde(default = "default_rank_reactions")]
    pub rank_reactions: Vec<String>,

    /// Acceptable reaction symbols for the role step. The display name is
    /// the part before the first `:`.
    #[serde(default = "default_role_reactions")]
    pub role_reactions: Vec<String>,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            welcome_message: default_welcome_message(),
            rank_message: default_rank_message(),
            role_message: default_role_message(),
            request_message: default_request_message(),
            restart_message: default_restart_message(),
            cancel_message: default_cancel_message(),
            incomplete_message: default_incomplete_message(),
            complete_message: default_complete_message(),
            platform_reactions: default_platform_reactions(),
            rank_reactions: default_rank_reactions(),
            role_reactions: default_role_reactions(),
        }
    }
}

fn default_welcome_message() -> String {
    "Welcome to the coaching inbox! Answer the questions below by reacting \
     to the emoji underneath, or react with the cross to cancel.\n\n\
     Which **platform** do you play on?"
        .to_string()
}

fn default_rank_message() -> String {
    "Which **rank** are you currently?".to_string()
}

fn default_role_message() -> String {
    "Which **role** would you like coaching for? Only roles with space for \
     new sessions are shown."
        .to_string()
}

fn default_request_message() -> String {
    "Finally, describe what you would like to work on in a single message."
        .to_string()
}

fn default_restart_message() -> String {
    "Restarting the questions. Answer again by reacting below.".to_string()
}

fn default_cancel_message() -> String {
    "Your coaching request has been cancelled. Message again any time to \
     start over."
        .to_string()
}

fn default_incomplete_message() -> String {
    "It looks like some questions above are still unanswered. Answer them by \
     reacting, then confirm with the checkmark below."
        .to_string()
}

fn default_complete_message() -> String {
    "Thanks! Your request has been forwarded to the coaching staff.".to_string()
}

fn default_platform_reactions() -> Vec<String> {
    vec!["PC".to_string(), "Console".to_string()]
}

fn default_rank_reactions() -> Vec<String> {
    vec![
        "Bronze".to_string(),
        "Silver".to_string(),
        "Gold".to_string(),
        "Platinum".to_string(),
        "Diamond".to_string(),
        "Master".to_string(),
    ]
}

fn default_role_reactions() -> Vec<String> {
    vec![
        "Tank".to_string(),
        "Damage".to_string(),
        "Support".to_string(),
    ]
}

/// Message relay behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Forward small attachments as native files; larger ones link-only.
    #[serde(default = "default_true")]
    pub relay_small_attachments: bool,

    /// Size threshold (bytes) below which attachments are forwarded
    /// natively.
    #[serde(default = "default_small_attachment_bytes")]
    pub small_attachment_bytes: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_small_attachments: default_true(),
            small_attachment_bytes: default_small_attachment_bytes(),
        }
    }
}

fn default_small_attachment_bytes() -> u64 {
    2 * 1024 * 1024
}

/// Time-based sweep settings. A sweep whose timeout is absent or zero is
/// disabled entirely, so misconfiguration never triggers mass action.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Minutes after creation before an unattended thread gets the wait-time
    /// apology.
    #[serde(default)]
    pub apology_timeout_minutes: Option<i64>,

    /// The apology DM. The apology sweep is disabled when unset.
    #[serde(default)]
    pub apology_message: Option<String>,

    /// Minutes after creation before an unfinished survey thread becomes an
    /// expiry candidate.
    #[serde(default)]
    pub gather_timeout_minutes: Option<i64>,
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("coachmail").join("coachmail.db"))
        .and_then(|p| p.to_str().map(str::to_string))
        .unwrap_or_else(|| "coachmail.db".to_string())
}
