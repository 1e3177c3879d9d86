use std::path::Path;

use serde::Deserialize;

/// Gateway tunables, loaded from a TOML file with per-field defaults so a
/// partial file (or none at all) still yields a working config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Locale used when neither the message nor the profile decides one.
    pub default_locale: String,
    /// Session TTL, refreshed on every session update.
    pub session_ttl_secs: i64,
    /// Sliding rate-limit window.
    pub rate_window_ms: u64,
    /// Max messages per sender inside one window.
    pub rate_max_requests: usize,
    /// Staged-rollout percentage for the domain router, `0..=100`. Used
    /// as the static fallback when no flag source overrides it.
    pub rollout_percent: u8,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_locale: "en".into(),
            session_ttl_secs: 24 * 60 * 60,
            rate_window_ms: 60_000,
            rate_max_requests: 20,
            rollout_percent: 100,
        }
    }
}

impl GatewayConfig {
    /// Load from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn session_ttl_ms(&self) -> i64 {
        self.session_ttl_secs * 1000
    }
}
