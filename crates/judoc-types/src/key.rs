use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Address of a stored object: an optional namespace plus a key.
///
/// At most one manifest exists per `ObjectKey`. The empty namespace is used
/// by the unscoped `/set`, `/get` and `/delete` routes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    namespace: String,
    key: String,
}

impl ObjectKey {
    /// Create a key scoped by `namespace`. The key part must not be empty.
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TypeError::EmptyKey);
        }
        Ok(Self {
            namespace: namespace.into(),
            key,
        })
    }

    /// Create a key in the empty namespace.
    pub fn unscoped(key: impl Into<String>) -> Result<Self, TypeError> {
        Self::new(String::new(), key)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` if this key lives in the empty namespace.
    pub fn is_unscoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({self})")
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}:{}", self.namespace, self.key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_display() {
        let k = ObjectKey::new("photos", "2024/cat.jpg").unwrap();
        assert_eq!(k.to_string(), "photos:2024/cat.jpg");
        assert_eq!(k.namespace(), "photos");
        assert_eq!(k.key(), "2024/cat.jpg");
        assert!(!k.is_unscoped());
    }

    #[test]
    fn unscoped_display() {
        let k = ObjectKey::unscoped("abc").unwrap();
        assert_eq!(k.to_string(), "abc");
        assert!(k.is_unscoped());
    }

    #[test]
    fn empty_key_rejected() {
        assert_eq!(ObjectKey::new("ns", "").unwrap_err(), TypeError::EmptyKey);
        assert_eq!(ObjectKey::unscoped("").unwrap_err(), TypeError::EmptyKey);
    }

    #[test]
    fn empty_namespace_allowed() {
        assert!(ObjectKey::new("", "k").is_ok());
    }

    #[test]
    fn namespaces_are_distinct() {
        let a = ObjectKey::new("a", "k").unwrap();
        let b = ObjectKey::new("b", "k").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn serde_roundtrip() {
        let k = ObjectKey::new("ns", "key").unwrap();
        let json = serde_json::to_string(&k).unwrap();
        let parsed: ObjectKey = serde_json::from_str(&json).unwrap();
        assert_eq!(k, parsed);
    }
}
