//! Pluggable feature systems and the process-wide registry.
//!
//! A [`FeatureSystem`] maps graphemes to feature sets and back, performs
//! feature arithmetic under geometry constraints, and measures distances
//! between sounds. Systems are registered by name in a process-wide
//! registry with a settable default; construction is lazy and one-shot,
//! reads afterwards take a short read lock.

pub mod ipa;

use crate::geometry;
use crate::intern::{FeatureSet, Label};
use crate::types::{ModifierList, ModifierOp, Sound};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

pub use ipa::IpaSystem;

/// Error raised by registry lookups.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The requested system was never registered.
    #[error("unknown feature system {name:?} (available: {available:?})")]
    UnknownSystem {
        /// The requested name.
        name: String,
        /// Names that are registered.
        available: Vec<String>,
    },
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// A bidirectional grapheme/feature mapping with feature arithmetic.
///
/// Implementations must be immutable after construction; they are shared
/// across threads behind `Arc`.
pub trait FeatureSystem: Send + Sync {
    /// The system's registry name.
    fn name(&self) -> &str;

    /// Canonical feature set for an atomic grapheme, `None` if unknown.
    fn grapheme_to_features(&self, grapheme: &str) -> Option<FeatureSet>;

    /// The grapheme whose inventory entry is closest to `features` by
    /// [`FeatureSystem::sound_distance`]; ties break by shortest then
    /// lexicographically smallest grapheme. `None` on an empty inventory.
    fn features_to_grapheme(&self, features: &FeatureSet) -> Option<String>;

    /// Whether `grapheme` names a sound class (`V`, `C`, ...).
    fn is_class(&self, grapheme: &str) -> bool {
        self.class_features(grapheme).is_some()
    }

    /// The partial feature set of a sound class, `None` if not a class.
    fn class_features(&self, grapheme: &str) -> Option<FeatureSet>;

    /// Add labels to `base`, displacing each added label's geometric
    /// siblings first. Labels unknown to the geometry are inserted
    /// opaquely.
    fn add_features(&self, base: &FeatureSet, added: &FeatureSet) -> FeatureSet {
        let tree = geometry::geometry();
        let mut result = base.clone();
        for label in added.iter() {
            let siblings = tree.siblings_of(label.as_str());
            if !siblings.is_empty() {
                result.retain(|l| !siblings.contains(l));
            }
            result.insert(label);
        }
        result
    }

    /// Subsumption: every label of `pattern` occurs in `target`.
    fn partial_match(&self, pattern: &FeatureSet, target: &FeatureSet) -> bool {
        pattern.is_subset(target)
    }

    /// Tree-edge distance between two feature labels.
    fn feature_distance(&self, a: Label, b: Label) -> f64 {
        geometry::geometry().feature_distance(a.as_str(), b.as_str()) as f64
    }

    /// Depth-weighted distance between two feature sets, in `[0, 1]`.
    fn sound_distance(&self, a: &FeatureSet, b: &FeatureSet) -> f64 {
        geometry::geometry().sound_distance(a, b)
    }
}

/// Apply an ordered modifier list to a feature set.
///
/// `+x` (and bare `x`) goes through [`FeatureSystem::add_features`] so that
/// geometric siblings are displaced; `-x` removes exactly `x`. Unknown
/// labels pass through opaquely — modifier application never fails.
pub fn apply_modifiers(
    base: &FeatureSet,
    mods: &ModifierList,
    system: &dyn FeatureSystem,
) -> FeatureSet {
    let mut result = base.clone();
    for op in &mods.ops {
        match *op {
            ModifierOp::Add(label) => {
                let single: FeatureSet = std::iter::once(label).collect();
                result = system.add_features(&result, &single);
            }
            ModifierOp::Remove(label) => result.remove(label),
        }
    }
    result
}

// ============================================================================
// Registry
// ============================================================================

struct Registry {
    systems: RwLock<FxHashMap<String, Arc<dyn FeatureSystem>>>,
    default_name: RwLock<String>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut systems: FxHashMap<String, Arc<dyn FeatureSystem>> = FxHashMap::default();
        systems.insert("ipa".to_owned(), Arc::new(IpaSystem::new()));
        Registry {
            systems: RwLock::new(systems),
            default_name: RwLock::new("ipa".to_owned()),
        }
    })
}

/// Register a feature system under a name, replacing any previous entry.
pub fn register(name: impl Into<String>, system: Arc<dyn FeatureSystem>) {
    registry().systems.write().insert(name.into(), system);
}

/// Look up a system by name; `None` resolves to the current default.
pub fn get_system(name: Option<&str>) -> Result<Arc<dyn FeatureSystem>> {
    let reg = registry();
    let key = match name {
        Some(n) => n.to_owned(),
        None => reg.default_name.read().clone(),
    };
    let systems = reg.systems.read();
    systems
        .get(&key)
        .cloned()
        .ok_or_else(|| RegistryError::UnknownSystem {
            name: key,
            available: list_systems(),
        })
}

/// Set the default system name. Fails if the name is unregistered.
pub fn set_default(name: &str) -> Result<()> {
    let reg = registry();
    if !reg.systems.read().contains_key(name) {
        return Err(RegistryError::UnknownSystem {
            name: name.to_owned(),
            available: list_systems(),
        });
    }
    *reg.default_name.write() = name.to_owned();
    Ok(())
}

/// Names of all registered systems.
pub fn list_systems() -> Vec<String> {
    let mut names: Vec<String> = registry().systems.read().keys().cloned().collect();
    names.sort();
    names
}

// ============================================================================
// Sound construction
// ============================================================================

/// Build a [`Sound`] for a grapheme under the given system.
///
/// Class names yield partial sounds carrying the class features. Unknown
/// graphemes are retried in NFC form and finally fall back to a concrete
/// sound with no features, so sequence parsing never fails.
pub fn sound(grapheme: &str, system: &dyn FeatureSystem) -> Sound {
    if let Some(features) = system.class_features(grapheme) {
        return Sound::partial(grapheme, features);
    }
    if let Some(features) = system.grapheme_to_features(grapheme) {
        return Sound::new(grapheme, features);
    }
    let normalized: String = grapheme.nfc().collect();
    if normalized != grapheme {
        if let Some(features) = system.grapheme_to_features(&normalized) {
            return Sound::new(grapheme, features);
        }
    }
    Sound::new(grapheme, FeatureSet::new())
}

/// Distance between two graphemes under a system, in `[0, 1]`.
///
/// The entry point used by comparative-method callers (alignment,
/// phylogeny): unknown graphemes have empty feature sets and are
/// maximally distant from known sounds.
pub fn grapheme_distance(a: &str, b: &str, system: &dyn FeatureSystem) -> f64 {
    if a == b {
        return 0.0;
    }
    let features_a = system.grapheme_to_features(a).unwrap_or_default();
    let features_b = system.grapheme_to_features(b).unwrap_or_default();
    if features_a.is_empty() && features_b.is_empty() {
        return 1.0;
    }
    system.sound_distance(&features_a, &features_b)
}
