//! String interning for container names, exposed names and shared keys.
//!
//! Federation graphs compare the same handful of names over and over
//! (every candidate declaration, every memo key). Interned names compare
//! by pointer and copy for free.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{LazyLock, RwLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Process-wide name table. Entries are leaked and never removed.
static NAMES: LazyLock<RwLock<HashSet<&'static str>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// An interned name.
///
/// Two `InternedString`s with equal contents share one allocation, so
/// equality and hashing work on the pointer. Ordering is lexical so that
/// sorted collections stay deterministic.
#[derive(Clone, Copy)]
pub struct InternedString {
    inner: &'static str,
}

impl InternedString {
    /// Intern `s`, returning the canonical handle for its contents.
    pub fn new(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();

        if let Some(found) = Self::lookup(s) {
            return found;
        }

        // A poisoned lock only means another thread panicked mid-insert;
        // the set itself is still a valid set of leaked strings.
        let mut names = NAMES.write().unwrap_or_else(|e| e.into_inner());
        if let Some(&existing) = names.get(s) {
            return InternedString { inner: existing };
        }

        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        names.insert(leaked);
        InternedString { inner: leaked }
    }

    /// Look up an already-interned name without interning it.
    pub fn lookup(s: &str) -> Option<Self> {
        let names = NAMES.read().unwrap_or_else(|e| e.into_inner());
        names.get(s).map(|&inner| InternedString { inner })
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.inner
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for InternedString {
    fn default() -> Self {
        InternedString::new("")
    }
}

impl Deref for InternedString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        self.inner
    }
}

impl AsRef<str> for InternedString {
    #[inline]
    fn as_ref(&self) -> &str {
        self.inner
    }
}

impl Borrow<str> for InternedString {
    #[inline]
    fn borrow(&self) -> &str {
        self.inner
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for InternedString {}

impl PartialEq<str> for InternedString {
    fn eq(&self, other: &str) -> bool {
        self.inner == other
    }
}

impl PartialEq<&str> for InternedString {
    fn eq(&self, other: &&str) -> bool {
        self.inner == *other
    }
}

impl PartialOrd for InternedString {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InternedString {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(other.inner)
    }
}

impl Hash for InternedString {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.inner, state)
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner, f)
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.inner, f)
    }
}

impl From<&str> for InternedString {
    fn from(s: &str) -> Self {
        InternedString::new(s)
    }
}

impl From<String> for InternedString {
    fn from(s: String) -> Self {
        InternedString::new(s)
    }
}

impl From<&String> for InternedString {
    fn from(s: &String) -> Self {
        InternedString::new(s)
    }
}

impl Serialize for InternedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.inner)
    }
}

impl<'de> Deserialize<'de> for InternedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(InternedString::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_same_name_same_pointer() {
        let a = InternedString::new("container-with-shared");
        let b = InternedString::from(String::from("container-with-shared"));

        assert_eq!(a, b);
        assert!(std::ptr::eq(a.as_str(), b.as_str()));
        assert_ne!(a, InternedString::new("container-no-shared"));
    }

    #[test]
    fn test_lookup_does_not_intern() {
        assert!(InternedString::lookup("never-interned-name-7f3a").is_none());
        let name = InternedString::new("interned-once-7f3a");
        assert_eq!(InternedString::lookup("interned-once-7f3a"), Some(name));
    }

    #[test]
    fn test_ordering_is_lexical() {
        let set: BTreeSet<InternedString> = ["zeta", "alpha", "mid"]
            .into_iter()
            .map(InternedString::new)
            .collect();
        let ordered: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
        assert_eq!(ordered, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_compares_with_str() {
        let key = InternedString::new("shared");
        assert!(key == "shared");
    }
}
