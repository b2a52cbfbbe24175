//! Node identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a cluster node; also the key of a reconcile task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeName(pub String);

impl NodeName {
    pub fn new(name: impl Into<String>) -> Self {
        NodeName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate a node name as an RFC 1123 subdomain.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() || s.len() > 253 {
            return None;
        }
        let valid = s.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && !part.starts_with('-')
                && !part.ends_with('-')
        });
        valid.then(|| NodeName(s.to_string()))
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeName {
    fn from(name: &str) -> Self {
        NodeName(name.to_string())
    }
}

impl From<String> for NodeName {
    fn from(name: String) -> Self {
        NodeName(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(NodeName::parse("worker-0").is_some());
        assert!(NodeName::parse("node1.example.com").is_some());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(NodeName::parse("").is_none());
        assert!(NodeName::parse("Worker").is_none());
        assert!(NodeName::parse("-worker").is_none());
        assert!(NodeName::parse("a..b").is_none());
    }

    #[test]
    fn test_serde_transparent() {
        let name = NodeName::new("worker-0");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"worker-0\"");
    }
}
