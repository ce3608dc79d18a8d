//! Client-side data model

use crate::common::tracing_middleware::generate_correlation_id;
use std::fmt;
use std::sync::Arc;

/// One replica endpoint, e.g. `http://10.0.0.7:8080/some_method/`
///
/// Cheap to clone; set once when the client is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaAddress(Arc<str>);

impl ReplicaAddress {
    pub fn new(uri: impl AsRef<str>) -> Self {
        Self(Arc::from(uri.as_ref().trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReplicaAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ReplicaAddress {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for ReplicaAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Id of a single outbound attempt; a query fanned out to three replicas
/// carries three distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Fresh UUID v4 based id
    pub fn generate() -> Self {
        Self(generate_correlation_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replica_address_trims() {
        let addr = ReplicaAddress::from("  http://localhost:1/m/ ");
        assert_eq!(addr.as_str(), "http://localhost:1/m/");
        assert_eq!(addr.to_string(), "http://localhost:1/m/");
        assert_eq!(addr, ReplicaAddress::from("http://localhost:1/m/".to_string()));
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let ids: std::collections::HashSet<_> =
            (0..100).map(|_| CorrelationId::generate()).collect();
        assert_eq!(ids.len(), 100);
    }
}
