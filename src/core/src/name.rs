//! Distribution names.
//!
//! A distribution name is used verbatim as the host registration key and,
//! after sanitisation, as the storage directory segment. Characters that can
//! never appear in a Windows path segment are rejected up front.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Characters Windows forbids in a path segment.
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Operator-supplied name of the target distribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DistributionName(String);

impl DistributionName {
    /// Validate and wrap a distribution name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: &str| ConvertError::InvalidDistributionName {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if name == "." || name == ".." {
            return Err(invalid("name is a relative path component"));
        }
        if let Some(c) = name.chars().find(|c| RESERVED_CHARS.contains(c)) {
            return Err(invalid(&format!("contains reserved character '{c}'")));
        }
        if name.chars().any(char::is_control) {
            return Err(invalid("contains a control character"));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistributionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DistributionName {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for DistributionName {
    type Error = ConvertError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<DistributionName> for String {
    fn from(name: DistributionName) -> Self {
        name.0
    }
}

impl AsRef<str> for DistributionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
