use crate::params::str_to_bool;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Raw `server` options as they appear in the configuration file.
pub type OptionSource = HashMap<String, Value>;

pub const HTTP_BASIC: &str = "http_basic";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigurationError {
    #[error("Invalid value '{value}' for option '{option}'")]
    NotAllowed { option: String, value: String },

    #[error("Option '{option}' should be of type {expected}, got '{value}'")]
    InvalidType {
        option: String,
        expected: OptionType,
        value: String,
    },

    #[error("Port cannot be 0")]
    InvalidPort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionType {
    Bool,
    Int,
    String,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Bool => write!(f, "bool"),
            OptionType::Int => write!(f, "int"),
            OptionType::String => write!(f, "string"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Int(i) => write!(f, "{i}"),
            OptionValue::String(s) => write!(f, "{s}"),
        }
    }
}

/// Resolves one option: the configured value if present, else `default`,
/// coerced to `option_type` and checked against `allowed`.
pub fn configure_option(
    source: &OptionSource,
    name: &str,
    default: OptionValue,
    option_type: OptionType,
    allowed: Option<&[&str]>,
) -> Result<OptionValue, ConfigurationError> {
    let value = match source.get(name) {
        Some(raw) => coerce(name, raw, option_type)?,
        None => default,
    };

    if let Some(allowed) = allowed {
        let literal = value.to_string();
        if !allowed.contains(&literal.as_str()) {
            return Err(ConfigurationError::NotAllowed {
                option: name.to_string(),
                value: literal,
            });
        }
    }

    Ok(value)
}

fn coerce(name: &str, raw: &Value, option_type: OptionType) -> Result<OptionValue, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidType {
        option: name.to_string(),
        expected: option_type,
        value: scalar_text(raw).unwrap_or_else(|| raw.to_string()),
    };

    match option_type {
        OptionType::Bool => match raw {
            Value::Bool(b) => Ok(OptionValue::Bool(*b)),
            Value::String(s) => str_to_bool(s).map(OptionValue::Bool).ok_or_else(invalid),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(OptionValue::Bool(false)),
                Some(1) => Ok(OptionValue::Bool(true)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        },
        OptionType::Int => match raw {
            Value::Number(n) => n.as_i64().map(OptionValue::Int).ok_or_else(invalid),
            Value::String(s) => s.trim().parse().map(OptionValue::Int).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        OptionType::String => scalar_text(raw).map(OptionValue::String).ok_or_else(invalid),
    }
}

fn scalar_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Process-wide server options. Built once at startup, read-only afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerOptions {
    pub prettyprint: bool,
    /// Maximum number of elements written for a lazily produced sequence.
    /// `0` disables the limit.
    pub json_record_limit: usize,
    pub authorization_method: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            prettyprint: false,
            json_record_limit: 1000,
            authorization_method: HTTP_BASIC.to_string(),
        }
    }
}

impl ServerOptions {
    pub fn from_source(source: &OptionSource) -> Result<Self, ConfigurationError> {
        let prettyprint = match configure_option(
            source,
            "prettyprint",
            OptionValue::Bool(false),
            OptionType::Bool,
            None,
        )? {
            OptionValue::Bool(b) => b,
            other => unreachable_type("prettyprint", OptionType::Bool, other)?,
        };

        let json_record_limit = match configure_option(
            source,
            "json_record_limit",
            OptionValue::Int(1000),
            OptionType::Int,
            None,
        )? {
            OptionValue::Int(limit) => {
                usize::try_from(limit).map_err(|_| ConfigurationError::NotAllowed {
                    option: "json_record_limit".to_string(),
                    value: limit.to_string(),
                })?
            }
            other => unreachable_type("json_record_limit", OptionType::Int, other)?,
        };

        let authorization_method = configure_option(
            source,
            "authorization_method",
            OptionValue::String(HTTP_BASIC.to_string()),
            OptionType::String,
            Some(&[HTTP_BASIC]),
        )?
        .to_string();

        tracing::debug!(
            prettyprint,
            json_record_limit,
            authorization_method = %authorization_method,
            "Configured server options"
        );

        Ok(ServerOptions {
            prettyprint,
            json_record_limit,
            authorization_method,
        })
    }
}

// `configure_option` always returns the requested type; this only keeps the
// matches exhaustive without panicking.
fn unreachable_type<T>(
    option: &str,
    expected: OptionType,
    value: OptionValue,
) -> Result<T, ConfigurationError> {
    Err(ConfigurationError::InvalidType {
        option: option.to_string(),
        expected,
        value: value.to_string(),
    })
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.port == 0 {
            return Err(ConfigurationError::InvalidPort);
        }
        Ok(())
    }
}
