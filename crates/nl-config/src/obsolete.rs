//! Obsolete CPU model set supplied by cluster configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CPU models the cluster marks obsolete when no explicit list is given.
pub const DEFAULT_OBSOLETE_CPU_MODELS: &[&str] = &[
    "486",
    "pentium",
    "pentium2",
    "pentium3",
    "pentiumpro",
    "coreduo",
    "n270",
    "core2duo",
    "Conroe",
    "athlon",
    "phenom",
    "qemu64",
    "qemu32",
    "kvm64",
    "kvm32",
];

/// Model name → obsolescence flag.
///
/// A model is obsolete only when present with flag `true`; an entry set to
/// `false` explicitly keeps the model usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObsoleteModelSet(BTreeMap<String, bool>);

impl Default for ObsoleteModelSet {
    fn default() -> Self {
        Self::from_models(DEFAULT_OBSOLETE_CPU_MODELS.iter().copied())
    }
}

impl ObsoleteModelSet {
    /// An empty set: nothing is obsolete.
    pub fn empty() -> Self {
        ObsoleteModelSet(BTreeMap::new())
    }

    /// Mark every listed model obsolete.
    pub fn from_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ObsoleteModelSet(models.into_iter().map(|m| (m.into(), true)).collect())
    }

    pub fn is_obsolete(&self, model: &str) -> bool {
        self.0.get(model).copied().unwrap_or(false)
    }

    pub fn insert(&mut self, model: impl Into<String>, obsolete: bool) {
        self.0.insert(model.into(), obsolete);
    }

    /// Models flagged obsolete, sorted.
    pub fn obsolete_models(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, obsolete)| **obsolete)
            .map(|(model, _)| model.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ObsoleteModelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_models(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contains_legacy_models() {
        let set = ObsoleteModelSet::default();
        assert_eq!(set.len(), DEFAULT_OBSOLETE_CPU_MODELS.len());
        assert!(set.is_obsolete("486"));
        assert!(set.is_obsolete("Conroe"));
        assert!(!set.is_obsolete("Skylake-Client-IBRS"));
    }

    #[test]
    fn test_false_flag_is_not_obsolete() {
        let mut set = ObsoleteModelSet::empty();
        set.insert("Penryn", false);
        set.insert("Nehalem", true);
        assert!(!set.is_obsolete("Penryn"));
        assert!(set.is_obsolete("Nehalem"));
        assert_eq!(set.obsolete_models(), vec!["Nehalem"]);
    }

    #[test]
    fn test_collect() {
        let set: ObsoleteModelSet = ["A", "B"].into_iter().collect();
        assert!(set.is_obsolete("A"));
        assert!(set.is_obsolete("B"));
        assert!(!set.is_obsolete("C"));
    }
}
