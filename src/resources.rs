//! Memoized loaders for the bundled phonological model tables.
//!
//! Three read-only TSV tables describe the default model: `sounds.tsv`
//! (grapheme to descriptive name), `features.tsv` (feature value to feature
//! class), and `classes.tsv` (sound class to description, required features,
//! and optional explicit members). The bundled copies are embedded in the
//! binary; each table is parsed once per process and shared from then on.

use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

const SOUNDS_TSV: &str = include_str!("../resources/sounds.tsv");
const FEATURES_TSV: &str = include_str!("../resources/features.tsv");
const CLASSES_TSV: &str = include_str!("../resources/classes.tsv");

/// Errors raised while loading or validating resource tables.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// The resource file could not be read.
    #[error("cannot read resource {name}: {reason}")]
    Unreadable {
        /// Resource name (e.g. `sounds.tsv`).
        name: String,
        /// Underlying I/O failure, rendered.
        reason: String,
    },

    /// A required column is missing from the header row.
    #[error("resource {name} is missing column {column}")]
    MissingColumn {
        /// Resource name.
        name: String,
        /// The absent column.
        column: String,
    },

    /// A row has no value in a required column.
    #[error("resource {name} row {row} has an empty {column}")]
    EmptyField {
        /// Resource name.
        name: String,
        /// 1-based data row number.
        row: usize,
        /// The empty column.
        column: String,
    },

    /// A key that must be unique appeared twice.
    #[error("duplicate key {key:?} in resource {name}")]
    DuplicateKey {
        /// Resource name.
        name: String,
        /// The offending key.
        key: String,
    },

    /// A sound class name is not uppercase.
    #[error("sound class {name:?} is not uppercase")]
    LowercaseClass {
        /// The offending class name.
        name: String,
    },
}

/// Result alias for resource operations.
pub type Result<T> = std::result::Result<T, ResourceError>;

/// A sound class row from `classes.tsv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundClass {
    /// Human-readable description.
    pub description: String,
    /// Comma-separated required features (may be empty).
    pub features: String,
    /// Explicit member graphemes (may be empty).
    pub graphemes: Vec<String>,
}

// ============================================================================
// TSV parsing
// ============================================================================

/// Parse TSV content into rows of column values.
///
/// The first line is the header. Rows shorter than the header are padded
/// with empty fields (trailing optional columns), and blank lines are
/// skipped. Returns the index of each requested column plus the rows.
fn parse_tsv(name: &str, content: &str, columns: &[&str]) -> Result<Vec<Vec<String>>> {
    let mut lines = content.lines();
    let header = lines.next().unwrap_or("");
    let header_cols: Vec<&str> = header.split('\t').collect();

    let mut indices = Vec::with_capacity(columns.len());
    for column in columns {
        let idx = header_cols.iter().position(|c| c.trim() == *column).ok_or_else(|| {
            ResourceError::MissingColumn {
                name: name.to_owned(),
                column: (*column).to_owned(),
            }
        })?;
        indices.push(idx);
    }

    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let row: Vec<String> = indices
            .iter()
            .map(|&i| fields.get(i).map(|f| f.trim().to_owned()).unwrap_or_default())
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn build_sounds(content: &str) -> Result<FxHashMap<String, String>> {
    let rows = parse_tsv("sounds.tsv", content, &["GRAPHEME", "NAME"])?;
    let mut sounds = FxHashMap::default();
    for (i, row) in rows.into_iter().enumerate() {
        let grapheme = row[0].clone();
        if grapheme.is_empty() {
            return Err(ResourceError::EmptyField {
                name: "sounds.tsv".to_owned(),
                row: i + 1,
                column: "GRAPHEME".to_owned(),
            });
        }
        if sounds.insert(grapheme.clone(), row[1].clone()).is_some() {
            return Err(ResourceError::DuplicateKey {
                name: "sounds.tsv".to_owned(),
                key: grapheme,
            });
        }
    }
    Ok(sounds)
}

fn build_features(content: &str) -> Result<Vec<(String, String)>> {
    let rows = parse_tsv("features.tsv", content, &["VALUE", "FEATURE"])?;
    let mut pairs = Vec::new();
    for (i, row) in rows.into_iter().enumerate() {
        let (value, feature) = (row[0].clone(), row[1].clone());
        if value.is_empty() {
            return Err(ResourceError::EmptyField {
                name: "features.tsv".to_owned(),
                row: i + 1,
                column: "VALUE".to_owned(),
            });
        }
        if pairs.iter().any(|(v, f)| *v == value && *f == feature) {
            return Err(ResourceError::DuplicateKey {
                name: "features.tsv".to_owned(),
                key: format!("{value}/{feature}"),
            });
        }
        pairs.push((value, feature));
    }
    Ok(pairs)
}

fn build_classes(content: &str) -> Result<FxHashMap<String, SoundClass>> {
    let rows = parse_tsv(
        "classes.tsv",
        content,
        &["SOUND_CLASS", "DESCRIPTION", "FEATURES", "GRAPHEMES"],
    )?;
    let mut classes = FxHashMap::default();
    for (i, row) in rows.into_iter().enumerate() {
        let name = row[0].clone();
        if name.is_empty() {
            return Err(ResourceError::EmptyField {
                name: "classes.tsv".to_owned(),
                row: i + 1,
                column: "SOUND_CLASS".to_owned(),
            });
        }
        if name.chars().any(|c| c.is_lowercase()) {
            return Err(ResourceError::LowercaseClass { name });
        }
        let graphemes: Vec<String> = if row[3].is_empty() {
            Vec::new()
        } else {
            row[3].split('|').map(|g| g.trim().to_owned()).collect()
        };
        let class = SoundClass {
            description: row[1].clone(),
            features: row[2].clone(),
            graphemes,
        };
        if classes.insert(name.clone(), class).is_some() {
            return Err(ResourceError::DuplicateKey {
                name: "classes.tsv".to_owned(),
                key: name,
            });
        }
    }
    Ok(classes)
}

// ============================================================================
// Memoized accessors for the bundled model
// ============================================================================

/// GRAPHEME -> NAME from the bundled `sounds.tsv`.
pub fn sounds() -> Result<&'static FxHashMap<String, String>> {
    static SOUNDS: OnceLock<Result<FxHashMap<String, String>>> = OnceLock::new();
    SOUNDS
        .get_or_init(|| build_sounds(SOUNDS_TSV))
        .as_ref()
        .map_err(Clone::clone)
}

/// (VALUE, FEATURE) pairs from the bundled `features.tsv`, in file order.
pub fn features() -> Result<&'static Vec<(String, String)>> {
    static FEATURES: OnceLock<Result<Vec<(String, String)>>> = OnceLock::new();
    FEATURES
        .get_or_init(|| build_features(FEATURES_TSV))
        .as_ref()
        .map_err(Clone::clone)
}

/// SOUND_CLASS -> class row from the bundled `classes.tsv`.
pub fn classes() -> Result<&'static FxHashMap<String, SoundClass>> {
    static CLASSES: OnceLock<Result<FxHashMap<String, SoundClass>>> = OnceLock::new();
    CLASSES
        .get_or_init(|| build_classes(CLASSES_TSV))
        .as_ref()
        .map_err(Clone::clone)
}

/// FEATURE -> set of VALUEs, inverted from [`features`].
pub fn feature_values() -> Result<&'static FxHashMap<String, Vec<String>>> {
    static VALUES: OnceLock<Result<FxHashMap<String, Vec<String>>>> = OnceLock::new();
    VALUES
        .get_or_init(|| {
            let mut map: FxHashMap<String, Vec<String>> = FxHashMap::default();
            for (value, feature) in features()? {
                map.entry(feature.clone()).or_default().push(value.clone());
            }
            Ok(map)
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// SOUND_CLASS -> explicit member graphemes.
pub fn class_graphemes() -> Result<&'static FxHashMap<String, Vec<String>>> {
    static GRAPHEMES: OnceLock<Result<FxHashMap<String, Vec<String>>>> = OnceLock::new();
    GRAPHEMES
        .get_or_init(|| {
            Ok(classes()?
                .iter()
                .map(|(name, class)| (name.clone(), class.graphemes.clone()))
                .collect())
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// SOUND_CLASS -> required-features string.
pub fn class_features() -> Result<&'static FxHashMap<String, String>> {
    static FEATS: OnceLock<Result<FxHashMap<String, String>>> = OnceLock::new();
    FEATS
        .get_or_init(|| {
            Ok(classes()?
                .iter()
                .map(|(name, class)| (name.clone(), class.features.clone()))
                .collect())
        })
        .as_ref()
        .map_err(Clone::clone)
}

// ============================================================================
// Loading external model directories
// ============================================================================

/// A model loaded from an external directory instead of the bundled data.
#[derive(Debug, Clone)]
pub struct ModelTables {
    /// GRAPHEME -> NAME.
    pub sounds: FxHashMap<String, String>,
    /// (VALUE, FEATURE) pairs.
    pub features: Vec<(String, String)>,
    /// SOUND_CLASS -> class row.
    pub classes: FxHashMap<String, SoundClass>,
}

impl ModelTables {
    /// Load `sounds.tsv`, `features.tsv`, and `classes.tsv` from a directory.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read = |file: &str| -> Result<String> {
            std::fs::read_to_string(dir.join(file)).map_err(|e| ResourceError::Unreadable {
                name: file.to_owned(),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            sounds: build_sounds(&read("sounds.tsv")?)?,
            features: build_features(&read("features.tsv")?)?,
            classes: build_classes(&read("classes.tsv")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_sounds_load() {
        let sounds = sounds().unwrap();
        assert_eq!(sounds.get("p").unwrap(), "voiceless bilabial stop consonant");
        assert_eq!(sounds.get("a").unwrap(), "open front unrounded vowel");
        assert!(sounds.len() > 80);
    }

    #[test]
    fn test_bundled_features_load() {
        let pairs = features().unwrap();
        assert!(pairs.contains(&("voiced".to_owned(), "phonation".to_owned())));
        let values = feature_values().unwrap();
        assert!(values.get("phonation").unwrap().contains(&"voiceless".to_owned()));
    }

    #[test]
    fn test_bundled_classes_load() {
        let classes = classes().unwrap();
        assert_eq!(classes.get("V").unwrap().features, "vowel");
        assert_eq!(classes.get("N").unwrap().graphemes.len(), 7);
        assert_eq!(class_features().unwrap().get("C").unwrap(), "consonant");
        assert!(class_graphemes().unwrap().get("N").unwrap().contains(&"ŋ".to_owned()));
    }

    #[test]
    fn test_duplicate_grapheme_rejected() {
        let tsv = "GRAPHEME\tNAME\np\tone\np\ttwo\n";
        let err = build_sounds(tsv).unwrap_err();
        assert!(matches!(err, ResourceError::DuplicateKey { .. }));
    }

    #[test]
    fn test_duplicate_feature_pair_rejected() {
        let tsv = "VALUE\tFEATURE\nvoiced\tphonation\nvoiced\tphonation\n";
        let err = build_features(tsv).unwrap_err();
        assert!(matches!(err, ResourceError::DuplicateKey { .. }));
    }

    #[test]
    fn test_lowercase_class_rejected() {
        let tsv = "SOUND_CLASS\tDESCRIPTION\tFEATURES\tGRAPHEMES\nVx\tbad\tvowel\t\n";
        let err = build_classes(tsv).unwrap_err();
        assert!(matches!(err, ResourceError::LowercaseClass { .. }));
    }

    #[test]
    fn test_missing_column_rejected() {
        let tsv = "GRAPHEME\np\n";
        let err = build_sounds(tsv).unwrap_err();
        assert!(matches!(err, ResourceError::MissingColumn { .. }));
    }

    #[test]
    fn test_short_rows_padded() {
        // Rows without the optional GRAPHEMES column still load.
        let tsv = "SOUND_CLASS\tDESCRIPTION\tFEATURES\tGRAPHEMES\nV\tvowels\tvowel\n";
        let classes = build_classes(tsv).unwrap();
        assert!(classes.get("V").unwrap().graphemes.is_empty());
    }
}
