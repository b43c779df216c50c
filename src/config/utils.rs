use std::env;
use std::str::FromStr;

/// Parse a boolean value from a string, supporting multiple formats
///
/// Accepts: "true", "false", "1", "0", "yes", "no" (case insensitive)
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Read and parse an environment variable.
///
/// Unset or empty variables yield `Ok(None)`; a value that does not parse is
/// an error naming the variable.
pub fn env_parse<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name} environment variable: {e}").into()),
        _ => Ok(None),
    }
}

/// Read a boolean environment variable using [`parse_bool`].
pub fn env_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_bool(raw.trim())
            .map(Some)
            .ok_or_else(|| format!("Invalid {name} environment variable: '{raw}'").into()),
        _ => Ok(None),
    }
}
