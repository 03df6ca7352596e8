//! Structured logging setup and log-safe helpers.

use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use crate::SessionError;

/// Environment variable holding the log filter directives.
pub const LOG_FILTER_ENV: &str = "LIVE_SIGHT_LOG";
/// Filter used when [`LOG_FILTER_ENV`] is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "live_sight=info";

/// Installs the global `fmt` subscriber.
///
/// # Errors
/// Returns [`SessionError::Logging`] when a global subscriber is already set.
pub fn init_logging() -> Result<(), SessionError> {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|error| SessionError::Logging(error.to_string()))
}

/// Current wall-clock time in unix milliseconds.
pub fn unix_timestamp_ms() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or(0)
}

/// Redacts the values of secret-looking `key=value` pairs.
///
/// Values run until the next `&`, whitespace or end of input.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for key in ["password", "token", "authorization", "bearer", "api_key"] {
        redacted = redact_key_value(&redacted, key);
    }
    redacted
}

fn redact_key_value(input: &str, key: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find(key) {
        let key_end = cursor + found + key.len();
        let Some(separator) = input[key_end..]
            .chars()
            .next()
            .filter(|c| *c == '=' || *c == ' ')
        else {
            output.push_str(&input[cursor..key_end]);
            cursor = key_end;
            continue;
        };

        let value_start = key_end + separator.len_utf8();
        let value_end = input[value_start..]
            .find(|c: char| c == '&' || c.is_whitespace())
            .map_or(input.len(), |offset| value_start + offset);

        output.push_str(&input[cursor..value_start]);
        output.push_str("<redacted>");
        cursor = value_end;
    }

    output.push_str(&input[cursor..]);
    output
}

#[cfg(test)]
mod tests {
    //! Unit tests for log redaction.

    use super::*;

    #[test]
    fn redacts_query_style_secrets() {
        assert_eq!(
            redact_sensitive("connect to wss://host/ws?token=abc123&mode=x failed"),
            "connect to wss://host/ws?token=<redacted>&mode=x failed"
        );
        assert_eq!(
            redact_sensitive("header Authorization: Bearer xyz"),
            "header Authorization: Bearer <redacted>"
        );
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(redact_sensitive("tokens are fine"), "tokens are fine");
        assert!(unix_timestamp_ms() > 1_600_000_000_000);
    }
}
