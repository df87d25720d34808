//! Label filters supplied as `key:value` on the command line

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelParseError {
    #[error("label {0:?} is missing the ':' separator (expected key:value)")]
    MissingSeparator(String),

    #[error("label {0:?} has an empty key (expected key:value)")]
    EmptyKey(String),

    #[error("label key {key:?} is invalid: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("label value {value:?} is invalid: {reason}")]
    InvalidValue { value: String, reason: &'static str },
}

/// Longest label name or value Kubernetes accepts
const MAX_NAME_LEN: usize = 63;

/// Longest DNS subdomain allowed as a key prefix
const MAX_PREFIX_LEN: usize = 253;

/// Check a label name or value: `[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?`, at most 63 chars
fn check_name(name: &str) -> Result<(), &'static str> {
    if name.len() > MAX_NAME_LEN {
        return Err("must be at most 63 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("may only contain alphanumerics, '-', '_' and '.'");
    }
    let alnum_edge = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !alnum_edge(name.chars().next()) || !alnum_edge(name.chars().last()) {
        return Err("must start and end with an alphanumeric character");
    }
    Ok(())
}

/// Check a key prefix: a lowercase DNS subdomain of at most 253 chars
fn check_prefix(prefix: &str) -> Result<(), &'static str> {
    if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
        return Err("prefix must be 1-253 characters");
    }
    for part in prefix.split('.') {
        let valid = !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !part.starts_with('-')
            && !part.ends_with('-');
        if !valid {
            return Err("prefix must be a lowercase DNS subdomain");
        }
    }
    Ok(())
}

fn check_key(key: &str) -> Result<(), LabelParseError> {
    let invalid = |reason| LabelParseError::InvalidKey {
        key: key.to_string(),
        reason,
    };
    match key.split_once('/') {
        Some((prefix, name)) => {
            check_prefix(prefix).map_err(invalid)?;
            check_name(name).map_err(invalid)
        }
        None => check_name(key).map_err(invalid),
    }
}

fn check_value(value: &str) -> Result<(), LabelParseError> {
    if value.is_empty() {
        return Ok(());
    }
    check_name(value).map_err(|reason| LabelParseError::InvalidValue {
        value: value.to_string(),
        reason,
    })
}

/// A single label key/value pair used to select Jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
    pub key: String,
    pub value: String,
}

impl LabelFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Kubernetes equality-based selector, e.g. `app=worker`
    pub fn selector(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

impl FromStr for LabelFilter {
    type Err = LabelParseError;

    /// Parse `key:value`. Tokens after the second `:` are ignored.
    ///
    /// Key and value must be valid Kubernetes label syntax, so one filter
    /// always renders to exactly one selector requirement.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = s.split(':');
        let key = bits.next().unwrap_or_default();
        let Some(value) = bits.next() else {
            return Err(LabelParseError::MissingSeparator(s.to_string()));
        };

        if key.is_empty() {
            return Err(LabelParseError::EmptyKey(s.to_string()));
        }
        check_key(key)?;
        check_value(value)?;

        Ok(LabelFilter::new(key, value))
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
