//! Runtime configuration for a viewer instance.

use std::time::Duration;

use tracing::warn;

pub const ENV_KEEPALIVE_MS: &str = "VIEWER_KEEPALIVE_MS";
pub const ENV_QUEUE_CAPACITY: &str = "VIEWER_QUEUE_CAPACITY";
pub const ENV_TESSELLATION_TOLERANCE: &str = "VIEWER_TESSELLATION_TOLERANCE";
pub const ENV_DEFAULT_NAME_PREFIX: &str = "VIEWER_DEFAULT_NAME_PREFIX";

/// Knobs shared by the registry, bus and export cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Idle window after which a blocked receive yields a keep-alive.
    pub keepalive: Duration,
    /// Soft cap on pending events per subscriber before coalescing kicks in.
    pub subscriber_queue_capacity: usize,
    /// Chordal tolerance passed to the kernel for hashing and export.
    pub tessellation_tolerance: f64,
    /// Prefix for auto-assigned names (`<prefix>_<n>`).
    pub default_name_prefix: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(1),
            subscriber_queue_capacity: 256,
            tessellation_tolerance: 0.01,
            default_name_prefix: "object".to_string(),
        }
    }
}

impl ViewerConfig {
    /// Short keep-alive window, for tests and local tooling.
    pub fn responsive() -> Self {
        Self {
            keepalive: Duration::from_millis(50),
            ..Self::default()
        }
    }

    /// Defaults overridden by `VIEWER_*` environment variables.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&lookup, ENV_KEEPALIVE_MS) {
            if ms > 0 {
                config.keepalive = Duration::from_millis(ms);
            } else {
                warn!(key = ENV_KEEPALIVE_MS, "keep-alive must be positive, using default");
            }
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, ENV_QUEUE_CAPACITY) {
            if capacity > 0 {
                config.subscriber_queue_capacity = capacity;
            } else {
                warn!(key = ENV_QUEUE_CAPACITY, "queue capacity must be positive, using default");
            }
        }
        if let Some(tol) = parse_var::<f64>(&lookup, ENV_TESSELLATION_TOLERANCE) {
            if tol.is_finite() && tol > 0.0 {
                config.tessellation_tolerance = tol;
            } else {
                warn!(key = ENV_TESSELLATION_TOLERANCE, "tolerance must be positive, using default");
            }
        }
        if let Some(prefix) = lookup(ENV_DEFAULT_NAME_PREFIX) {
            let prefix = prefix.trim();
            if !prefix.is_empty() {
                config.default_name_prefix = prefix.to_string();
            }
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ViewerConfig::from_lookup(|_| None);
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.keepalive, Duration::from_secs(1));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ViewerConfig::from_lookup(lookup_from(&[
            (ENV_KEEPALIVE_MS, "250"),
            (ENV_QUEUE_CAPACITY, "8"),
            (ENV_TESSELLATION_TOLERANCE, "0.5"),
            (ENV_DEFAULT_NAME_PREFIX, "part"),
        ]));
        assert_eq!(config.keepalive, Duration::from_millis(250));
        assert_eq!(config.subscriber_queue_capacity, 8);
        assert_eq!(config.tessellation_tolerance, 0.5);
        assert_eq!(config.default_name_prefix, "part");
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = ViewerConfig::from_lookup(lookup_from(&[
            (ENV_KEEPALIVE_MS, "soon"),
            (ENV_QUEUE_CAPACITY, "0"),
            (ENV_TESSELLATION_TOLERANCE, "-1"),
            (ENV_DEFAULT_NAME_PREFIX, "  "),
        ]));
        assert_eq!(config, ViewerConfig::default());
    }
}
