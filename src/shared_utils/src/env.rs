use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading configuration from the process environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvVarError {
    /// The variable is set but its value could not be parsed.
    #[error("Environment variable {name} has invalid value {value:?}: {message}")]
    Invalid {
        name: String,
        value: String,
        message: String,
    },
}

/// Reads an optional override. Unset and blank values are both treated as absent.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads and parses an optional override, e.g. a millisecond delay.
///
/// Returns `Ok(None)` when the variable is unset or blank.
pub fn parse_env_var_opt<T>(name: &str) -> Result<Option<T>, EnvVarError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_var_opt(name) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| EnvVarError::Invalid {
                name: name.to_string(),
                message: e.to_string(),
                value,
            }),
    }
}
