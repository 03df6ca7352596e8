//! Environment-driven runtime configuration.

use std::time::Duration;

use live_sight_capture::{CaptureConstraints, SamplerConfig};
use live_sight_core::ModeSelection;
use live_sight_stream::validate_stream_endpoint;
use url::Url;

use crate::SessionError;
use crate::session::SessionSettings;

/// Inference service stream endpoint.
pub const ENV_ENDPOINT: &str = "LIVE_SIGHT_ENDPOINT";
/// Capture cadence in milliseconds.
pub const ENV_INTERVAL_MS: &str = "LIVE_SIGHT_INTERVAL_MS";
/// Encode target height in pixels.
pub const ENV_TARGET_HEIGHT: &str = "LIVE_SIGHT_TARGET_HEIGHT";
/// JPEG quality, `1..=100`.
pub const ENV_JPEG_QUALITY: &str = "LIVE_SIGHT_JPEG_QUALITY";
/// In-flight result timeout in milliseconds.
pub const ENV_RESULT_TIMEOUT_MS: &str = "LIVE_SIGHT_RESULT_TIMEOUT_MS";
/// Initial analysis mode.
pub const ENV_MODE: &str = "LIVE_SIGHT_MODE";
/// Capture kill switch.
pub const ENV_CAPTURE_ENABLED: &str = "LIVE_SIGHT_CAPTURE_ENABLED";

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000/ws/live";
/// In-flight result timeout used when none is configured.
pub const DEFAULT_RESULT_TIMEOUT_MS: u64 = 10_000;

/// Validated application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Stream endpoint (`ws`/`wss`).
    pub endpoint: Url,
    /// Cadence and encode settings.
    pub sampler: SamplerConfig,
    /// How long a request may stay in flight.
    pub result_timeout_ms: u64,
    /// Mode selected at startup.
    pub initial_mode: ModeSelection,
    /// Kill switch state.
    pub capture_enabled: bool,
    /// Video device index.
    pub device_index: u32,
}

/// Values that take precedence over the environment, usually CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Stream endpoint.
    pub endpoint: Option<String>,
    /// Capture cadence in milliseconds.
    pub interval_ms: Option<u64>,
    /// Encode target height.
    pub target_height: Option<u32>,
    /// JPEG quality.
    pub jpeg_quality: Option<u8>,
    /// Result timeout in milliseconds.
    pub result_timeout_ms: Option<u64>,
    /// Initial mode.
    pub mode: Option<ModeSelection>,
    /// Video device index.
    pub device_index: Option<u32>,
}

impl AppConfig {
    /// Loads configuration from process environment variables.
    ///
    /// # Errors
    /// Returns [`SessionError::Config`] for unparsable or out-of-range values.
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps variable names to
    /// values. Unset and blank variables take their defaults.
    ///
    /// # Errors
    /// Returns [`SessionError::Config`] for unparsable or out-of-range values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SessionError> {
        let value = |key: &str| lookup(key).filter(|raw| !raw.trim().is_empty());

        let endpoint = value(ENV_ENDPOINT).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let defaults = SamplerConfig::default();
        let interval_ms = parse_or(
            value(ENV_INTERVAL_MS),
            ENV_INTERVAL_MS,
            defaults.interval_ms,
        )?;
        let target_height = parse_or(
            value(ENV_TARGET_HEIGHT),
            ENV_TARGET_HEIGHT,
            defaults.target_height,
        )?;
        let jpeg_quality = parse_or(
            value(ENV_JPEG_QUALITY),
            ENV_JPEG_QUALITY,
            defaults.jpeg_quality,
        )?;
        let result_timeout_ms = parse_or(
            value(ENV_RESULT_TIMEOUT_MS),
            ENV_RESULT_TIMEOUT_MS,
            DEFAULT_RESULT_TIMEOUT_MS,
        )?;
        let initial_mode = parse_or(value(ENV_MODE), ENV_MODE, ModeSelection::default())?;
        let capture_enabled = value(ENV_CAPTURE_ENABLED)
            .map(|raw| flag_enabled(&raw))
            .unwrap_or(true);

        Self::validated(
            &endpoint,
            interval_ms,
            target_height,
            jpeg_quality,
            result_timeout_ms,
            initial_mode,
            capture_enabled,
            0,
        )
    }

    /// Applies `overrides` on top of this configuration and re-validates.
    ///
    /// # Errors
    /// Returns [`SessionError::Config`] when an override is out of range.
    pub fn with_overrides(self, overrides: ConfigOverrides) -> Result<Self, SessionError> {
        let endpoint = overrides
            .endpoint
            .unwrap_or_else(|| self.endpoint.to_string());
        Self::validated(
            &endpoint,
            overrides.interval_ms.unwrap_or(self.sampler.interval_ms),
            overrides
                .target_height
                .unwrap_or(self.sampler.target_height),
            overrides.jpeg_quality.unwrap_or(self.sampler.jpeg_quality),
            overrides
                .result_timeout_ms
                .unwrap_or(self.result_timeout_ms),
            overrides.mode.unwrap_or(self.initial_mode),
            self.capture_enabled,
            overrides.device_index.unwrap_or(self.device_index),
        )
    }

    /// Session settings derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            endpoint: self.endpoint.clone(),
            constraints: CaptureConstraints {
                device_index: self.device_index,
                ..CaptureConstraints::default()
            },
            sampler: self.sampler,
            result_timeout: Duration::from_millis(self.result_timeout_ms),
            initial_mode: self.initial_mode,
            capture_enabled: self.capture_enabled,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn validated(
        endpoint: &str,
        interval_ms: u64,
        target_height: u32,
        jpeg_quality: u8,
        result_timeout_ms: u64,
        initial_mode: ModeSelection,
        capture_enabled: bool,
        device_index: u32,
    ) -> Result<Self, SessionError> {
        let endpoint = validate_stream_endpoint(endpoint)
            .map_err(|error| SessionError::Config(error.to_string()))?;
        let sampler = SamplerConfig::new(interval_ms, target_height, jpeg_quality)
            .map_err(|error| SessionError::Config(error.to_string()))?;
        if result_timeout_ms == 0 {
            return Err(SessionError::Config(
                "result timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            endpoint,
            sampler,
            result_timeout_ms,
            initial_mode,
            capture_enabled,
            device_index,
        })
    }
}

/// Kill-switch semantics: `0`, `false` and `off` (case-insensitive) disable
/// capture; any other value, or an unset variable, leaves it enabled.
fn flag_enabled(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    !(normalized == "0" || normalized == "false" || normalized == "off")
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T, SessionError>
where
    T: std::str::FromStr,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SessionError::Config(format!("{key} has invalid value '{}'", raw.trim()))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration defaults and validation.

    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_settings() {
        let config = AppConfig::from_lookup(lookup(&[])).expect("defaults should be valid");
        assert_eq!(config.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(config.sampler, SamplerConfig::default());
        assert_eq!(config.result_timeout_ms, DEFAULT_RESULT_TIMEOUT_MS);
        assert_eq!(config.initial_mode, ModeSelection::Surveillance);
        assert!(config.capture_enabled);
    }

    #[test]
    fn reads_and_validates_environment_values() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_ENDPOINT, "wss://vision.example.test/ws/live"),
            (ENV_INTERVAL_MS, "500"),
            (ENV_MODE, "self-driving"),
            (ENV_CAPTURE_ENABLED, "off"),
        ]))
        .expect("config should be valid");
        assert_eq!(config.sampler.interval_ms, 500);
        assert_eq!(config.initial_mode, ModeSelection::SelfDriving);
        assert!(!config.capture_enabled);

        assert!(AppConfig::from_lookup(lookup(&[(ENV_ENDPOINT, "http://x.test/ws")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(ENV_JPEG_QUALITY, "101")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(ENV_INTERVAL_MS, "soon")])).is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let config = AppConfig::from_lookup(lookup(&[(ENV_INTERVAL_MS, "500")]))
            .expect("config should be valid")
            .with_overrides(ConfigOverrides {
                interval_ms: Some(750),
                mode: Some(ModeSelection::Assistive),
                device_index: Some(2),
                ..ConfigOverrides::default()
            })
            .expect("overrides should be valid");
        assert_eq!(config.sampler.interval_ms, 750);
        assert_eq!(config.initial_mode, ModeSelection::Assistive);
        assert_eq!(config.session_settings().constraints.device_index, 2);
    }
}
