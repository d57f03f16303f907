// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./coachmail.toml` > `~/.config/coachmail/coachmail.toml`
//! > `/etc/coachmail/coachmail.toml` with environment variable overrides via
//! `COACHMAIL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CoachmailConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/coachmail/coachmail.toml` (system-wide)
/// 3. `~/.config/coachmail/coachmail.toml` (user XDG config)
/// 4. `./coachmail.toml` (local directory)
/// 5. `COACHMAIL_*` environment variables
pub fn load_config() -> Result<CoachmailConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CoachmailConfig::default()))
        .merge(Toml::file("/etc/coachmail/coachmail.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("coachmail/coachmail.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("coachmail.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<CoachmailConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CoachmailConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CoachmailConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CoachmailConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `COACHMAIL_STORAGE_DATABASE_PATH` must
/// map to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("COACHMAIL_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("threads_", "threads.", 1)
            .replacen("gather_", "gather.", 1)
            .replacen("relay_", "relay.", 1)
            .replacen("scheduler_", "scheduler.", 1)
            .replacen("storage_", "storage.", 1);
        mapped.into()
    })
}
