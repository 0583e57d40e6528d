//! Environment lookups shared by the config loaders.

use std::str::FromStr;

/// Reads a switch. Only the exact value `true` turns it on.
pub(crate) fn flag<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).is_some_and(|v| v.trim() == "true")
}

/// Reads a non-empty string.
pub(crate) fn string<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads a number, falling back to `default` when unset or unparsable.
pub(crate) fn number<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = string(lookup, key) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, default = %default, "ignoring unparsable setting");
            default
        }
    }
}

/// Lookup backed by the process environment.
pub(crate) fn process(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
