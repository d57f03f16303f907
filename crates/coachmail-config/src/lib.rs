// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered TOML configuration for the coachmail relay.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::CoachmailConfig;
