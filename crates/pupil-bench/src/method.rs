//! Deterministic trial identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub const METHOD_PREFIX: &str = "benchmark";

/// `benchmark.<dataset>.<scale>.<host>.<detector>`.
///
/// Components may not contain `.` (so the tag splits back unambiguously),
/// path separators or whitespace; the tag doubles as an artifact file stem.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodTag(String);

impl MethodTag {
    pub fn new(
        dataset: &str,
        scale: &str,
        host: &str,
        detector: &str,
    ) -> Result<Self, ConfigError> {
        for (role, value) in [
            ("dataset", dataset),
            ("scale policy", scale),
            ("host", host),
            ("detector", detector),
        ] {
            check_component(role, value)?;
        }
        Ok(Self([METHOD_PREFIX, dataset, scale, host, detector].join(".")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substring test used by skip rules.
    pub fn matches(&self, pattern: &str) -> bool {
        self.0.contains(pattern)
    }
}

impl fmt::Display for MethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MethodTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn check_component(role: &'static str, value: &str) -> Result<(), ConfigError> {
    let bad = value.is_empty()
        || value
            .chars()
            .any(|c| c == '.' || c == '/' || c == '\\' || c.is_whitespace() || c.is_control());
    if bad {
        Err(ConfigError::InvalidName {
            role,
            name: value.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Make a host name usable as a tag component (`lab.example.org` becomes
/// `lab-example-org`).
pub fn sanitize_host(host: &str) -> String {
    let cleaned: String = host
        .trim()
        .chars()
        .map(|c| {
            if c == '.' || c == '/' || c == '\\' || c.is_whitespace() || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "localhost".to_string()
    } else {
        cleaned
    }
}
