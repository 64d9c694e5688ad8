use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The distinguished capability key the rarity prefilter buckets on.
pub const BROWSER_NAME_KEY: &str = "browserName";

/// An opaque, immutable mapping of capability keys to JSON-like values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Capabilities(BTreeMap<String, Value>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        Capabilities(map)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `browserName` capability, if requested.
    pub fn browser_name(&self) -> Option<&str> {
        self.get(BROWSER_NAME_KEY).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A capability template a node advertises as "I can serve sessions matching this".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stereotype {
    pub capabilities: Capabilities,
    /// Total slots this stereotype can serve concurrently.
    pub slots: u32,
}

impl Stereotype {
    pub fn new(capabilities: Capabilities, slots: u32) -> Self {
        Self { capabilities, slots }
    }

    pub fn browser_name(&self) -> Option<&str> {
        self.capabilities.browser_name()
    }

    /// Whether this stereotype's capabilities satisfy the requested ones.
    ///
    /// Every key requested must be present with an equal value; a stereotype
    /// may advertise additional keys the request does not ask for.
    pub fn matches(&self, requested: &Capabilities) -> bool {
        requested.0.iter().all(|(k, v)| self.capabilities.0.get(k) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_name_reads_distinguished_key() {
        let caps = Capabilities::new().with(BROWSER_NAME_KEY, "chrome");
        assert_eq!(caps.browser_name(), Some("chrome"));
    }

    #[test]
    fn stereotype_matches_requires_exact_value_equality() {
        let stereotype = Stereotype::new(Capabilities::new().with("browserName", "chrome").with("platform", "linux"), 2);
        let request = Capabilities::new().with("browserName", "chrome");
        assert!(stereotype.matches(&request));

        let mismatched = Capabilities::new().with("browserName", "firefox");
        assert!(!stereotype.matches(&mismatched));
    }
}
