// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. All functions are free async fns taking `&Database`.

pub mod messages;
pub mod threads;
