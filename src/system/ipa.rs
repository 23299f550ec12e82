//! The default IPA categorical feature system.
//!
//! Backed by the bundled TSV tables: graphemes come from `sounds.tsv`,
//! whose NAME column is filtered against the feature vocabulary of
//! `features.tsv`; sound classes come from `classes.tsv`. All tables are
//! built once on first use.

use super::FeatureSystem;
use crate::intern::{FeatureSet, Label};
use crate::resources;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::OnceLock;

/// IPA categorical feature system backed by the bundled model tables.
///
/// Missing or malformed resources degrade to an empty inventory (the
/// loaders themselves surface [`resources::ResourceError`] to callers
/// that load eagerly); lookups on an empty inventory simply return `None`.
#[derive(Debug, Default)]
pub struct IpaSystem {
    _private: (),
}

struct Tables {
    /// grapheme -> canonical features.
    graphemes: FxHashMap<String, FeatureSet>,
    /// Exact feature set -> grapheme, for the fast reverse path.
    reverse: FxHashMap<FeatureSet, String>,
    /// class name -> partial features.
    classes: FxHashMap<String, FeatureSet>,
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let vocabulary: FxHashSet<&str> = resources::features()
            .map(|pairs| pairs.iter().map(|(value, _)| value.as_str()).collect())
            .unwrap_or_default();

        let mut graphemes: FxHashMap<String, FeatureSet> = FxHashMap::default();
        if let Ok(sounds) = resources::sounds() {
            for (grapheme, name) in sounds {
                let features: FeatureSet = name
                    .split_whitespace()
                    .filter(|word| vocabulary.contains(word))
                    .map(Label::intern)
                    .collect();
                if !features.is_empty() {
                    graphemes.insert(grapheme.clone(), features);
                }
            }
        }

        // First grapheme wins on an exact-feature collision; with shorter
        // graphemes preferred the reverse lookup stays deterministic.
        let mut entries: Vec<(&String, &FeatureSet)> = graphemes.iter().collect();
        entries.sort_by(|(a, _), (b, _)| {
            a.chars()
                .count()
                .cmp(&b.chars().count())
                .then_with(|| a.cmp(b))
        });
        let mut reverse: FxHashMap<FeatureSet, String> = FxHashMap::default();
        for (grapheme, features) in entries {
            reverse.entry(features.clone()).or_insert_with(|| grapheme.clone());
        }

        let mut classes: FxHashMap<String, FeatureSet> = FxHashMap::default();
        if let Ok(rows) = resources::classes() {
            for (name, class) in rows {
                let features = FeatureSet::from_names(
                    class
                        .features
                        .split(',')
                        .map(|f| f.trim())
                        .filter(|f| !f.is_empty()),
                );
                if !features.is_empty() {
                    classes.insert(name.clone(), features);
                }
            }
        }

        Tables {
            graphemes,
            reverse,
            classes,
        }
    })
}

impl IpaSystem {
    /// Create the system. Tables are shared process-wide, so this is cheap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of graphemes in the inventory.
    pub fn inventory_size(&self) -> usize {
        tables().graphemes.len()
    }
}

impl FeatureSystem for IpaSystem {
    fn name(&self) -> &str {
        "ipa"
    }

    fn grapheme_to_features(&self, grapheme: &str) -> Option<FeatureSet> {
        tables().graphemes.get(grapheme).cloned()
    }

    fn features_to_grapheme(&self, features: &FeatureSet) -> Option<String> {
        let tables = tables();
        if let Some(exact) = tables.reverse.get(features) {
            return Some(exact.clone());
        }

        // No exact entry: scan the inventory for the closest sound; ties
        // break by shortest grapheme, then lexicographically.
        let mut best: Option<(f64, &String)> = None;
        for (grapheme, entry) in &tables.graphemes {
            let distance = self.sound_distance(features, entry);
            let better = match &best {
                None => true,
                Some((best_distance, best_grapheme)) => {
                    distance < *best_distance
                        || (distance == *best_distance
                            && (grapheme.chars().count(), grapheme.as_str())
                                < (best_grapheme.chars().count(), best_grapheme.as_str()))
                }
            };
            if better {
                best = Some((distance, grapheme));
            }
        }
        best.map(|(_, grapheme)| grapheme.clone())
    }

    fn class_features(&self, grapheme: &str) -> Option<FeatureSet> {
        tables().classes.get(grapheme).cloned()
    }
}
