//! Interned feature labels and feature sets.
//!
//! Feature labels come from a small closed vocabulary (the resource tables
//! plus the geometry tree), so they are interned into `u32`-backed [`Label`]
//! symbols with O(1) equality and hashing. A [`FeatureSet`] is a sorted,
//! deduplicated collection of labels with cheap set algebra; small sets
//! (the typical case — a segment carries 4-6 features) stay on the stack.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::OnceLock;

/// An interned feature label (e.g. `voiced`, `alveolar`, `stop`).
///
/// Labels are process-wide: the same spelling always interns to the same
/// symbol, so equality and hashing are single-word comparisons.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(u32);

struct Interner {
    by_name: RwLock<FxHashMap<&'static str, Label>>,
    names: RwLock<Vec<&'static str>>,
}

fn interner() -> &'static Interner {
    static INTERNER: OnceLock<Interner> = OnceLock::new();
    INTERNER.get_or_init(|| Interner {
        by_name: RwLock::new(FxHashMap::default()),
        names: RwLock::new(Vec::new()),
    })
}

impl Label {
    /// Intern a label, returning its symbol.
    pub fn intern(name: &str) -> Self {
        let table = interner();
        if let Some(&label) = table.by_name.read().get(name) {
            return label;
        }
        let mut by_name = table.by_name.write();
        // Re-check under the write lock: another thread may have won the race.
        if let Some(&label) = by_name.get(name) {
            return label;
        }
        let mut names = table.names.write();
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let label = Label(names.len() as u32);
        names.push(leaked);
        by_name.insert(leaked, label);
        label
    }

    /// The label's spelling.
    pub fn as_str(self) -> &'static str {
        interner().names.read()[self.0 as usize]
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({})", self.as_str())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Label::intern(name)
    }
}

/// An immutable set of feature labels.
///
/// Stored as a sorted, deduplicated vector of interned symbols; sets of up
/// to eight labels need no heap allocation. Equality and hashing are
/// canonical because the representation is sorted.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct FeatureSet(SmallVec<[Label; 8]>);

impl FeatureSet {
    /// The empty feature set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from label spellings.
    pub fn from_names<'a, I: IntoIterator<Item = &'a str>>(names: I) -> Self {
        names.into_iter().map(Label::intern).collect()
    }

    /// Number of labels in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `label` is a member.
    pub fn contains(&self, label: Label) -> bool {
        self.0.binary_search(&label).is_ok()
    }

    /// Insert a label, keeping the representation sorted.
    pub fn insert(&mut self, label: Label) {
        if let Err(pos) = self.0.binary_search(&label) {
            self.0.insert(pos, label);
        }
    }

    /// Remove a label if present.
    pub fn remove(&mut self, label: Label) {
        if let Ok(pos) = self.0.binary_search(&label) {
            self.0.remove(pos);
        }
    }

    /// Drop every label for which `keep` returns false.
    pub fn retain<F: FnMut(Label) -> bool>(&mut self, mut keep: F) {
        self.0.retain(|l| keep(*l));
    }

    /// Whether every label of `self` is in `other` (subsumption).
    pub fn is_subset(&self, other: &FeatureSet) -> bool {
        // Merge walk over the two sorted vectors.
        let mut it = other.0.iter();
        'outer: for needle in &self.0 {
            for candidate in it.by_ref() {
                if candidate == needle {
                    continue 'outer;
                }
                if candidate > needle {
                    return false;
                }
            }
            return false;
        }
        true
    }

    /// Labels present in exactly one of the two sets.
    pub fn symmetric_difference(&self, other: &FeatureSet) -> FeatureSet {
        self.0
            .iter()
            .filter(|l| !other.contains(**l))
            .chain(other.0.iter().filter(|l| !self.contains(**l)))
            .copied()
            .collect()
    }

    /// Labels present in either set.
    pub fn union(&self, other: &FeatureSet) -> FeatureSet {
        self.0.iter().chain(other.0.iter()).copied().collect()
    }

    /// Iterate over the member labels (in interning order).
    pub fn iter(&self) -> impl Iterator<Item = Label> + '_ {
        self.0.iter().copied()
    }

    /// Member spellings in alphabetical order, for stable display.
    pub fn sorted_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.0.iter().map(|l| l.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl FromIterator<Label> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        let mut labels: SmallVec<[Label; 8]> = iter.into_iter().collect();
        labels.sort_unstable();
        labels.dedup();
        FeatureSet(labels)
    }
}

impl fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.sorted_names().join(", "))
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sorted_names().join(","))
    }
}

#[cfg(feature = "serialization")]
impl serde::Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serialization")]
impl<'de> serde::Deserialize<'de> for Label {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Label::intern(&name))
    }
}

#[cfg(feature = "serialization")]
impl serde::Serialize for FeatureSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.sorted_names())
    }
}

#[cfg(feature = "serialization")]
impl<'de> serde::Deserialize<'de> for FeatureSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        Ok(FeatureSet::from_names(names.iter().map(|s| s.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_stable() {
        let a = Label::intern("voiced");
        let b = Label::intern("voiced");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "voiced");
        assert_ne!(a, Label::intern("voiceless"));
    }

    #[test]
    fn test_feature_set_dedup_and_order_independence() {
        let a = FeatureSet::from_names(["stop", "voiced", "alveolar"]);
        let b = FeatureSet::from_names(["alveolar", "stop", "voiced", "stop"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_subset() {
        let pattern = FeatureSet::from_names(["consonant"]);
        let target = FeatureSet::from_names(["consonant", "voiced", "alveolar", "stop"]);
        assert!(pattern.is_subset(&target));
        assert!(!target.is_subset(&pattern));
        assert!(FeatureSet::new().is_subset(&target));
    }

    #[test]
    fn test_symmetric_difference() {
        let a = FeatureSet::from_names(["voiced", "stop"]);
        let b = FeatureSet::from_names(["voiceless", "stop"]);
        let diff = a.symmetric_difference(&b);
        assert_eq!(diff, FeatureSet::from_names(["voiced", "voiceless"]));
        assert!(a.symmetric_difference(&a).is_empty());
    }

    #[test]
    fn test_insert_remove() {
        let mut set = FeatureSet::from_names(["stop"]);
        set.insert(Label::intern("voiced"));
        set.insert(Label::intern("voiced"));
        assert_eq!(set.len(), 2);
        set.remove(Label::intern("stop"));
        assert_eq!(set, FeatureSet::from_names(["voiced"]));
    }
}
