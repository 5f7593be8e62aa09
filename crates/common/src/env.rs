//! Typed, fallback-on-error accessors for string-keyed configuration.
//!
//! Mirrors the reference stack's environment-variable-driven knobs: a
//! misconfigured value is logged and the default is used rather than
//! failing startup, since these are almost always operator tuning values
//! rather than correctness-critical inputs.

use std::{
    collections::HashMap,
    fmt::Debug,
    str::FromStr,
};

/// Looks up `name` in `values`, parsing it as `T`. Falls back to `default`
/// (with a warning) if the key is absent or fails to parse.
pub fn config_value<T>(values: &HashMap<String, String>, name: &str, default: T) -> T
where
    T: FromStr + Debug + Clone,
    <T as FromStr>::Err: Debug,
{
    let Some(raw) = values.get(name) else {
        return default;
    };
    match T::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                key = name,
                value = raw,
                error = ?e,
                default = ?default,
                "invalid configuration value, falling back to default"
            );
            default
        },
    }
}

/// Same as [`config_value`], but reads from `std::env::var` instead of a map.
pub fn env_value<T>(name: &str, default: T) -> T
where
    T: FromStr + Debug + Clone,
    <T as FromStr>::Err: Debug,
{
    let raw = match std::env::var(name) {
        Ok(raw) => raw,
        Err(std::env::VarError::NotPresent) => return default,
        Err(std::env::VarError::NotUnicode(_)) => {
            tracing::warn!(key = name, "non-unicode environment value, using default");
            return default;
        },
    };
    match T::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                key = name,
                value = raw,
                error = ?e,
                default = ?default,
                "invalid environment value, falling back to default"
            );
            default
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_uses_default() {
        let values = HashMap::new();
        assert_eq!(config_value(&values, "missing", 42u64), 42);
    }

    #[test]
    fn parseable_value_overrides_default() {
        let mut values = HashMap::new();
        values.insert("limit".to_string(), "1024".to_string());
        assert_eq!(config_value(&values, "limit", 42u64), 1024);
    }

    #[test]
    fn unparseable_value_falls_back() {
        let mut values = HashMap::new();
        values.insert("limit".to_string(), "not-a-number".to_string());
        assert_eq!(config_value(&values, "limit", 42u64), 42);
    }
}
