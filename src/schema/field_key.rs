//! Possibly multi-segment column identifiers.
//!
//! A `FieldKey` names a column, optionally qualified by a chain of
//! foreign-key lookups: `customer/country/name` means "follow the customer
//! lookup, then its country lookup, then take name".

use std::fmt;

/// A column identifier: one or more `/`-separated segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    parts: Vec<String>,
}

impl FieldKey {
    /// Single-segment key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            parts: vec![name.into()],
        }
    }

    pub fn from_parts(parts: Vec<String>) -> Self {
        debug_assert!(!parts.is_empty(), "field key needs at least one segment");
        Self { parts }
    }

    /// Parse the `parent/child` encoding used in URLs and descriptors.
    pub fn parse(encoded: &str) -> Self {
        Self {
            parts: encoded.split('/').map(|s| s.to_string()).collect(),
        }
    }

    /// The final segment: the column's own name.
    pub fn name(&self) -> &str {
        self.parts.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// Everything but the final segment, if any.
    pub fn parent(&self) -> Option<FieldKey> {
        if self.parts.len() <= 1 {
            None
        } else {
            Some(FieldKey {
                parts: self.parts[..self.parts.len() - 1].to_vec(),
            })
        }
    }

    /// Extend the chain with a child segment.
    pub fn child(&self, name: impl Into<String>) -> FieldKey {
        let mut parts = self.parts.clone();
        parts.push(name.into());
        FieldKey { parts }
    }

    /// Re-root this key under `prefix`.
    pub fn prefixed_by(&self, prefix: &FieldKey) -> FieldKey {
        let mut parts = prefix.parts.clone();
        parts.extend(self.parts.iter().cloned());
        FieldKey { parts }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }

    /// Case-insensitive equality, matching column-name lookup semantics.
    pub fn eq_ignore_case(&self, other: &FieldKey) -> bool {
        self.parts.len() == other.parts.len()
            && self
                .parts
                .iter()
                .zip(&other.parts)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Lowercased encoding, usable as a case-insensitive map key.
    pub fn canonical(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("/"))
    }
}

impl From<&str> for FieldKey {
    fn from(s: &str) -> Self {
        FieldKey::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_key() {
        let k = FieldKey::new("amount");
        assert_eq!(k.name(), "amount");
        assert!(k.is_simple());
        assert!(k.parent().is_none());
        assert_eq!(k.to_string(), "amount");
    }

    #[test]
    fn test_parse_round_trip() {
        let k = FieldKey::parse("customer/country/name");
        assert_eq!(k.parts().len(), 3);
        assert_eq!(k.name(), "name");
        assert_eq!(k.to_string(), "customer/country/name");
        assert_eq!(k.parent().unwrap().to_string(), "customer/country");
    }

    #[test]
    fn test_child_and_prefix() {
        let base = FieldKey::new("customer");
        let full = base.child("name");
        assert_eq!(full.to_string(), "customer/name");
        let rerooted = FieldKey::new("name").prefixed_by(&base);
        assert_eq!(rerooted, full);
    }

    #[test]
    fn test_case_insensitive_equality() {
        let a = FieldKey::parse("Customer/Name");
        let b = FieldKey::parse("customer/name");
        assert!(a.eq_ignore_case(&b));
        assert_ne!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }
}
