//! Immutable process environment snapshots.
//!
//! Builds never touch the real process environment. The ambient environment is
//! captured once into an [`Environment`], and every target receives its own copy
//! with the target's overrides laid on top. The snapshot a target was derived
//! from is left untouched, so targets cannot leak settings into each other even
//! when the matrix runs in parallel.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

/// An owned, ordered set of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<OsString, OsString>,
}

impl Environment {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the current process environment.
    pub fn capture() -> Self {
        std::env::vars_os().collect()
    }

    /// Returns the value of `key`, if set.
    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterates variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    /// Returns a new environment with `overrides` applied on top of a copy of
    /// `self`. Keys present in both take the override's value.
    pub fn overlay<'a, I>(&self, overrides: I) -> Environment
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut vars = self.vars.clone();
        for (key, value) in overrides {
            vars.insert(OsString::from(key), OsString::from(value));
        }
        Environment { vars }
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<OsString>,
    V: Into<OsString>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Environment {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn overlay_replaces_and_adds_without_touching_ambient() {
        let ambient: Environment = [("A", "1")].into_iter().collect();
        let target = ambient.overlay(&overrides(&[("A", "2"), ("B", "3")]));

        let expected: Environment = [("A", "2"), ("B", "3")].into_iter().collect();
        assert_eq!(target, expected);

        let unchanged: Environment = [("A", "1")].into_iter().collect();
        assert_eq!(ambient, unchanged);
    }

    #[test]
    fn overlays_do_not_leak_between_targets() {
        let ambient: Environment = [("PATH", "/usr/bin")].into_iter().collect();
        let ios = ambient.overlay(&overrides(&[("GOOS", "ios"), ("CC", "clang")]));
        let darwin = ambient.overlay(&overrides(&[("GOOS", "darwin")]));

        assert_eq!(ios.get("CC"), Some(OsStr::new("clang")));
        assert_eq!(darwin.get("CC"), None);
        assert_eq!(darwin.get("PATH"), Some(OsStr::new("/usr/bin")));
        assert_eq!(ambient.len(), 1);
    }

    #[test]
    fn capture_reflects_process_environment() {
        let env = Environment::capture();
        assert_eq!(env.len(), std::env::vars_os().count());
    }

    #[test]
    fn iter_is_sorted_by_key() {
        let env: Environment = [("B", "2"), ("A", "1")].into_iter().collect();
        let keys: Vec<_> = env.iter().map(|(k, _)| k.to_os_string()).collect();
        assert_eq!(keys, vec![OsString::from("A"), OsString::from("B")]);
    }
}
