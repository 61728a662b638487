//! Validated identifiers exchanged with the broker.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Serialized web origin (`scheme://host[:port]`) of a requesting context.
///
/// The origin is the unit of consent scoping. It is compared as an exact
/// string after validation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    /// Parses and validates a serialized origin.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidOrigin`] if the string is not of the
    /// form `scheme://host[:port]`.
    pub fn parse(origin: impl Into<String>) -> Result<Self, ValidationError> {
        let origin = origin.into();
        let invalid = |reason| ValidationError::InvalidOrigin {
            origin: origin.clone(),
            reason,
        };

        if origin.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid("contains whitespace or control characters"));
        }
        let Some((scheme, authority)) = origin.split_once("://") else {
            return Err(invalid("missing scheme separator"));
        };
        if scheme.is_empty()
            || !scheme.starts_with(|c: char| c.is_ascii_lowercase())
            || !scheme
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-.".contains(c))
        {
            return Err(invalid("scheme must be lowercase ascii"));
        }
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }
        if authority.contains(['/', '?', '#', '@']) {
            return Err(invalid("origin must not carry a path, query, fragment or userinfo"));
        }
        // IPv6 literals keep their colons inside brackets.
        let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
            let Some((literal, after)) = rest.split_once(']') else {
                return Err(invalid("unterminated IPv6 literal"));
            };
            let port = if after.is_empty() {
                None
            } else {
                Some(after.strip_prefix(':').ok_or_else(|| invalid("invalid port"))?)
            };
            (literal, port)
        } else {
            match authority.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        if port.is_some_and(|port| port.parse::<u16>().is_err()) {
            return Err(invalid("invalid port"));
        }
        Ok(Self(origin))
    }

    /// Returns the serialized origin.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Origin {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.0
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({})", self.0)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable, origin-local label shown in consent prompts.
///
/// Descriptions are never part of a storage key and are never handed to
/// another origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Description(String);

impl Description {
    /// Validates a description.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty (or only whitespace) or
    /// contains a line break or other control character.
    pub fn parse(description: impl Into<String>) -> Result<Self, ValidationError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        // Covers \n, \r and the other C0/C1 controls, plus the Unicode line
        // and paragraph separators.
        if description
            .chars()
            .any(|c| c.is_control() || matches!(c, '\u{2028}' | '\u{2029}'))
        {
            return Err(ValidationError::DescriptionControlCharacter);
        }
        Ok(Self(description))
    }

    /// Returns the description text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Description {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Description> for String {
    fn from(description: Description) -> Self {
        description.0
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
