// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small text and time helpers shared across the relay.

use chrono::{DateTime, SecondsFormat, Utc};

use coachmail_core::UserId;

/// Current UTC time as the canonical stored timestamp string.
pub fn now_ts() -> String {
    ts(Utc::now())
}

/// Format a UTC time as the canonical stored timestamp string.
pub fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `[HH:MM]` prefix for relayed messages when thread timestamps are on.
pub fn timestamp_prefix(at: DateTime<Utc>) -> String {
    at.format("[%H:%M] ").to_string()
}

/// Platform mention for a user id.
pub fn mention(user: &UserId) -> String {
    format!("<@!{user}>")
}

const SLUG_LEN: usize = 20;

/// Channel or category name for a person: slugified display name plus the
/// last four characters of the id to disambiguate identical slugs.
pub fn slug_with_id(name: &str, id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let suffix: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}-{}", slugify(name, SLUG_LEN), suffix)
}

/// Lowercased, ascii-only, dash-separated channel slug capped at `max` chars.
pub fn slugify(name: &str, max: usize) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= max {
            break;
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() { "user".to_string() } else { slug }
}

/// Split text into chunks of at most `limit` characters, breaking at the
/// last newline or space inside the window when one exists.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.chars().count() > limit {
        let window: String = rest.chars().take(limit).collect();
        let next_is_boundary = rest[window.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == ' ' || c == '\n');
        let cut = if next_is_boundary {
            window.len()
        } else {
            window
                .rfind(['\n', ' '])
                .filter(|&i| i > 0)
                .unwrap_or(window.len())
        };
        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start_matches(['\n', ' ']);
    }
    chunks.push(rest.to_string());
    chunks
}

/// Wrap bare URLs in angle brackets so the platform suppresses previews.
pub fn disable_link_previews(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("http://").into_iter().chain(rest.find("https://")).min() {
        let (before, from_url) = rest.split_at(pos);
        out.push_str(before);
        let url_len = from_url
            .find(char::is_whitespace)
            .unwrap_or(from_url.len());
        let (url, after) = from_url.split_at(url_len);
        if before.ends_with('<') {
            out.push_str(url);
        } else {
            out.push('<');
            out.push_str(url);
            out.push('>');
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Human-readable age like "3 days" or "5 hours" for thread headers.
pub fn humanize_age(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    let minutes = (to - from).num_minutes().max(0);
    if minutes < 60 {
        plural(minutes, "minute")
    } else if minutes < 60 * 24 {
        plural(minutes / 60, "hour")
    } else if minutes < 60 * 24 * 30 {
        plural(minutes / (60 * 24), "day")
    } else if minutes < 60 * 24 * 365 {
        plural(minutes / (60 * 24 * 30), "month")
    } else {
        plural(minutes / (60 * 24 * 365), "year")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// The display part of a configured reaction symbol: everything before the
/// first `:` (custom emoji are configured as `name:id`).
pub fn symbol_display(symbol: &str) -> &str {
    symbol.split(':').next().unwrap_or(symbol)
}

/// Whether an incoming reaction symbol matches a configured one, comparing
/// either the full form or the display part.
pub fn symbol_matches(configured: &str, incoming: &str) -> bool {
    configured == incoming || symbol_display(configured) == symbol_display(incoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slugify_transliterates_and_caps() {
        assert_eq!(slugify("Some User", 20), "some-user");
        assert_eq!(slugify("Ünïcódé Nàme!!", 20), "n-c-d-n-me");
        assert_eq!(slugify("-- --", 20), "user");
        assert!(slugify("a-very-long-user-name-indeed", 10).len() <= 10);
    }

    #[test]
    fn slug_with_id_appends_the_id_tail() {
        assert_eq!(slug_with_id("Coach Carter", "9001"), "coach-carter-9001");
        assert_eq!(slug_with_id("Some User", "1234567654"), "some-user-7654");
        assert_eq!(slug_with_id("X", "ab"), "x-ab");
    }

    #[test]
    fn chunk_text_respects_the_limit_and_breaks_at_spaces() {
        let text = "aaaa bbbb cccc";
        let chunks = chunk_text(text, 9);
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc"]);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 9);
        }
    }

    #[test]
    fn chunk_text_hard_cuts_unbroken_runs() {
        let text = "a".repeat(25);
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn chunk_text_short_input_is_one_chunk() {
        assert_eq!(chunk_text("hello", 2000), vec!["hello".to_string()]);
    }

    #[test]
    fn link_previews_are_disabled_once() {
        assert_eq!(
            disable_link_previews("see https://example.com/a for info"),
            "see <https://example.com/a> for info"
        );
        assert_eq!(
            disable_link_previews("already <https://example.com/a> wrapped"),
            "already <https://example.com/a> wrapped"
        );
    }

    #[test]
    fn humanize_age_picks_the_largest_unit() {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(humanize_age(base, base + chrono::Duration::minutes(1)), "1 minute");
        assert_eq!(humanize_age(base, base + chrono::Duration::hours(5)), "5 hours");
        assert_eq!(humanize_age(base, base + chrono::Duration::days(3)), "3 days");
        assert_eq!(humanize_age(base, base + chrono::Duration::days(400)), "1 year");
    }

    #[test]
    fn symbol_matching_uses_the_display_part() {
        assert!(symbol_matches("Tank:1234", "Tank"));
        assert!(symbol_matches("Tank", "Tank:9999"));
        assert!(symbol_matches("PC", "PC"));
        assert!(!symbol_matches("Tank", "Support"));
    }
}
