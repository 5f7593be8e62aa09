use std::{
    collections::HashMap,
    time::Duration,
};

use anyhow::Context;
use common::env::config_value;

/// Default Holding Queue limit: 8 MiB of transaction bodies queued behind
/// in-flight lookups before new transactions start getting dropped.
pub const DEFAULT_BUFFER_LIMIT_BYTES: u64 = 8 * 1024 * 1024;
/// Default number of manifest lookups allowed outstanding at once.
pub const DEFAULT_MANIFEST_CONCURRENCY: usize = 64;
/// Default per-lookup HTTP timeout.
pub const DEFAULT_MANIFEST_TIMEOUT: Duration = Duration::from_secs(10);

fn default_user_agent() -> String {
    format!("union-station-segmenter/{}", env!("CARGO_PKG_VERSION"))
}

/// Runtime configuration, built from a flat string map so it can be sourced
/// from a config file, environment variables, or test fixtures uniformly.
/// Every value has a documented default and parses with a warn-and-fall-back
/// policy — a malformed value never prevents startup.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub buffer_limit_bytes: u64,
    pub manifest_url: String,
    pub manifest_concurrency: usize,
    pub manifest_timeout: Duration,
    pub user_agent: String,
}

impl SegmenterConfig {
    /// `union_station_segmenter_manifest_url` has no default: without it
    /// there is nowhere to send lookups, so construction fails outright
    /// rather than silently falling back to something nonsensical.
    pub fn from_map(values: &HashMap<String, String>) -> anyhow::Result<Self> {
        let manifest_url = values
            .get("union_station_segmenter_manifest_url")
            .context("union_station_segmenter_manifest_url is required")?
            .clone();
        url::Url::parse(&manifest_url).context("union_station_segmenter_manifest_url is not a valid URL")?;

        let buffer_limit_bytes = config_value(
            values,
            "union_station_segmenter_buffer_limit",
            DEFAULT_BUFFER_LIMIT_BYTES,
        );
        let manifest_concurrency = config_value(
            values,
            "union_station_segmenter_manifest_concurrency",
            DEFAULT_MANIFEST_CONCURRENCY,
        );
        let user_agent = values
            .get("union_station_segmenter_user_agent")
            .cloned()
            .unwrap_or_else(default_user_agent);

        Ok(Self {
            buffer_limit_bytes,
            manifest_url,
            manifest_concurrency,
            manifest_timeout: DEFAULT_MANIFEST_TIMEOUT,
            user_agent,
        })
    }

    /// Reads the same option names from `std::env`, for production startup.
    pub fn from_env() -> anyhow::Result<Self> {
        const NAMES: &[&str] = &[
            "union_station_segmenter_manifest_url",
            "union_station_segmenter_buffer_limit",
            "union_station_segmenter_manifest_concurrency",
            "union_station_segmenter_user_agent",
        ];
        let values: HashMap<String, String> = NAMES
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.to_string(), value)))
            .collect();
        Self::from_map(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_manifest_url() {
        let values = HashMap::new();
        assert!(SegmenterConfig::from_map(&values).is_err());
    }

    #[test]
    fn applies_defaults_when_optional_values_absent() {
        let mut values = HashMap::new();
        values.insert(
            "union_station_segmenter_manifest_url".to_string(),
            "https://manifest.example/lookup".to_string(),
        );
        let config = SegmenterConfig::from_map(&values).unwrap();
        assert_eq!(config.buffer_limit_bytes, DEFAULT_BUFFER_LIMIT_BYTES);
        assert_eq!(config.manifest_concurrency, DEFAULT_MANIFEST_CONCURRENCY);
    }

    #[test]
    fn overrides_take_effect() {
        let mut values = HashMap::new();
        values.insert(
            "union_station_segmenter_manifest_url".to_string(),
            "https://manifest.example/lookup".to_string(),
        );
        values.insert("union_station_segmenter_buffer_limit".to_string(), "4096".to_string());
        let config = SegmenterConfig::from_map(&values).unwrap();
        assert_eq!(config.buffer_limit_bytes, 4096);
    }
}
