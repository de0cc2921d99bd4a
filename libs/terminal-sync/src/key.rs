//! Mapping keys
//!
//! A decision is keyed either by an incoming sub-item's position in the
//! reported list or by the id of a device already on the target terminal.
//! The textual form (`incoming-<n>` or the bare device id) is only used at
//! the edges: plan files, CLI arguments and notifications.

use std::fmt;
use std::str::FromStr;

use errors::SyncError;
use serde::{Deserialize, Serialize};

const INCOMING_PREFIX: &str = "incoming-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MappingKey {
    /// Incoming sub-item by ordinal index
    Incoming(usize),
    /// Existing device by registry id
    Existing(String),
}

impl MappingKey {
    pub fn incoming(index: usize) -> Self {
        MappingKey::Incoming(index)
    }

    pub fn existing(id: impl Into<String>) -> Self {
        MappingKey::Existing(id.into())
    }

    pub fn is_incoming(&self) -> bool {
        matches!(self, MappingKey::Incoming(_))
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKey::Incoming(index) => write!(f, "{}{}", INCOMING_PREFIX, index),
            MappingKey::Existing(id) => f.write_str(id),
        }
    }
}

impl FromStr for MappingKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SyncError::UnknownKey(s.to_string()));
        }
        match s.strip_prefix(INCOMING_PREFIX) {
            Some(index) => index
                .parse::<usize>()
                .map(MappingKey::Incoming)
                .map_err(|_| SyncError::UnknownKey(s.to_string())),
            None => Ok(MappingKey::Existing(s.to_string())),
        }
    }
}

impl TryFrom<String> for MappingKey {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MappingKey> for String {
    fn from(key: MappingKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let key: MappingKey = "incoming-2".parse().unwrap();
        assert_eq!(key, MappingKey::Incoming(2));
        assert_eq!(key.to_string(), "incoming-2");

        let key: MappingKey = "8bf3a7fe-7f8a".parse().unwrap();
        assert_eq!(key, MappingKey::existing("8bf3a7fe-7f8a"));
        assert!(!key.is_incoming());
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!("".parse::<MappingKey>().is_err());
        assert!("incoming-x".parse::<MappingKey>().is_err());
    }

    #[test]
    fn test_incoming_and_existing_never_collide() {
        // A device whose id is "0" is not the first incoming item
        assert_ne!(MappingKey::existing("0"), MappingKey::incoming(0));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&MappingKey::incoming(1)).unwrap();
        assert_eq!(json, "\"incoming-1\"");
        let key: MappingKey = serde_json::from_str("\"dev-9\"").unwrap();
        assert_eq!(key, MappingKey::existing("dev-9"));
    }
}
