//! Request parameter encoding
//!
//! Parses the comma-separated `key=value` lists accepted on the command line
//! and encodes sandbox durations as ISO-8601 periods.

use crate::error::SandboxError;
use crate::Result;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::str::FromStr;

/// Encode a minute count as an ISO-8601 period (`PT{minutes}M`)
pub fn iso_duration(minutes: u64) -> String {
    format!("PT{}M", minutes)
}

/// Ordered key/value pairs, serialized as a JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValues(Vec<(String, String)>);

impl KeyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key1=val1,key2=val2`
    ///
    /// Whitespace around keys and values is trimmed. An empty (or blank)
    /// string yields an empty list.
    pub fn parse(input: &str) -> Result<Self> {
        let mut pairs = KeyValues::new();

        if input.trim().is_empty() {
            return Ok(pairs);
        }

        for item in input.split(',') {
            let parts: Vec<&str> = item.split('=').collect();
            if parts.len() != 2 {
                return Err(SandboxError::Validation(format!(
                    "'{}' is not a key=value pair; expected a comma-separated list of key=values: key1=val1, key2=val2...",
                    item.trim()
                )));
            }

            pairs.insert(parts[0].trim(), parts[1].trim())?;
        }

        Ok(pairs)
    }

    /// Append a pair, rejecting empty and repeated keys
    pub fn insert(&mut self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(SandboxError::Validation(format!(
                "empty key in pair '={}'",
                value
            )));
        }
        if self.get(key).is_some() {
            return Err(SandboxError::Validation(format!(
                "key '{}' is given more than once",
                key
            )));
        }
        self.0.push((key.to_string(), value.to_string()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for KeyValues {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self> {
        KeyValues::parse(s)
    }
}

impl std::fmt::Display for KeyValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl Serialize for KeyValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
