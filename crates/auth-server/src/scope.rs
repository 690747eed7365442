//! OAuth scope sets
//!
//! Scopes travel on the wire as a space-delimited list (RFC 6749 Section 3.3)
//! and are compared as sets.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An unordered set of scope tokens, kept sorted for stable output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(BTreeSet<String>);

impl Scope {
    /// Parse a space-delimited scope string. Repeated spaces are ignored.
    pub fn parse(raw: &str) -> Self {
        raw.split(' ').filter(|s| !s.is_empty()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    /// True if every token in `self` is also in `permitted`
    pub fn is_subset(&self, permitted: &Scope) -> bool {
        self.0.is_subset(&permitted.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Scope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(token)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_space_delimited() {
        let scope = Scope::parse("read write");
        assert!(scope.contains("read"));
        assert!(scope.contains("write"));
        assert_eq!(scope.iter().count(), 2);
    }

    #[test]
    fn test_parse_ignores_extra_spaces() {
        let scope = Scope::parse("  read   write ");
        assert_eq!(scope, Scope::from_iter(["read", "write"]));
    }

    #[test]
    fn test_parse_empty() {
        assert!(Scope::parse("").is_empty());
        assert!(Scope::parse("   ").is_empty());
    }

    #[test]
    fn test_display_sorted() {
        let scope = Scope::parse("write admin read");
        assert_eq!(scope.to_string(), "admin read write");
    }

    #[test]
    fn test_subset() {
        let permitted = Scope::parse("read write");
        assert!(Scope::parse("read").is_subset(&permitted));
        assert!(Scope::default().is_subset(&permitted));
        assert!(!Scope::parse("read admin").is_subset(&permitted));
    }

    #[test]
    fn test_serde_as_array() {
        let scope = Scope::parse("b a");
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
        let back: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
    }
}
