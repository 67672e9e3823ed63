//! Duration parsing and formatting for timed actions

use crate::moderation::{ModerationError, ModerationResult};
use chrono::Duration;

const UNITS: [(char, i64, &str); 5] = [
    ('w', 7 * 24 * 3600, "week"),
    ('d', 24 * 3600, "day"),
    ('h', 3600, "hour"),
    ('m', 60, "minute"),
    ('s', 1, "second"),
];

/// Parse a duration such as `1d12h` or `30m`.
///
/// # Errors
/// Returns [`ModerationError::InvalidInput`] when the text is not a sequence of
/// `<number><unit>` segments or adds up to zero.
pub fn parse_duration(input: &str) -> ModerationResult<Duration> {
    let invalid = || {
        ModerationError::InvalidInput(format!(
            "`{input}` is not a valid duration! Use something like `1d12h` or `30m`."
        ))
    };

    let input = input.trim();
    if input.is_empty() {
        return Err(invalid());
    }

    let mut total: i64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = c.to_ascii_lowercase();
        let Some((_, seconds, _)) = UNITS.iter().find(|(symbol, _, _)| *symbol == unit) else {
            return Err(invalid());
        };
        if digits.is_empty() {
            return Err(invalid());
        }
        let amount: i64 = digits.parse().map_err(|_| invalid())?;
        total = amount
            .checked_mul(*seconds)
            .and_then(|value| total.checked_add(value))
            .ok_or_else(invalid)?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    if total == 0 {
        return Err(ModerationError::InvalidInput(
            "The duration has to be more than 0!".to_string(),
        ));
    }

    Duration::try_seconds(total).ok_or_else(invalid)
}

/// Render a duration as e.g. `2 days 3 hours`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.num_seconds().max(0);
    let mut parts = Vec::new();
    for (_, seconds, name) in UNITS {
        let amount = remaining / seconds;
        if amount > 0 {
            let plural = if amount == 1 { "" } else { "s" };
            parts.push(format!("{amount} {name}{plural}"));
            remaining %= seconds;
        }
    }
    if parts.is_empty() {
        return "0 seconds".to_string();
    }
    parts.join(" ")
}
