//! Feature geometry tree (Clements & Hume 1995).
//!
//! The tree organizes feature labels into contrast groups: the labels of
//! feature nodes that are siblings under the same group node are mutually
//! exclusive, and so are the positive and negative labels of a single
//! feature node. Feature arithmetic consults [`GeometryNode::siblings_of`]
//! to displace incompatible labels, and the distance functions weight
//! labels by their depth in the tree (deeper labels are finer contrasts
//! and contribute less to sound distance).

use crate::intern::{FeatureSet, Label};
use std::sync::OnceLock;

/// Distance reported when either label is unknown to the tree.
pub const UNKNOWN_DISTANCE: usize = 999;

/// A leaf node: one feature contrast with a positive and an optional
/// negative (privative features leave `negative` empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureNode {
    /// Contrast name, e.g. `voice`.
    pub name: &'static str,
    /// Positive label, e.g. `voiced`.
    pub positive: &'static str,
    /// Negative label, e.g. `voiceless`; empty for privative features.
    pub negative: &'static str,
}

impl FeatureNode {
    fn holds(&self, label: &str) -> bool {
        self.positive == label || (!self.negative.is_empty() && self.negative == label)
    }
}

/// An internal grouping node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryNode {
    /// Group name, e.g. `Laryngeal`.
    pub name: &'static str,
    /// Child nodes.
    pub children: Vec<Node>,
}

/// A node of the geometry tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A feature contrast leaf.
    Feature(FeatureNode),
    /// A grouping node.
    Group(GeometryNode),
}

fn feat(name: &'static str, positive: &'static str, negative: &'static str) -> Node {
    Node::Feature(FeatureNode {
        name,
        positive,
        negative,
    })
}

fn priv_feat(name: &'static str, positive: &'static str) -> Node {
    feat(name, positive, "")
}

fn group(name: &'static str, children: Vec<Node>) -> Node {
    Node::Group(GeometryNode { name, children })
}

impl GeometryNode {
    /// All labels known to this subtree (positive and negative).
    pub fn all_features(&self) -> FeatureSet {
        let mut result = FeatureSet::new();
        self.collect_features(&mut result);
        result
    }

    fn collect_features(&self, out: &mut FeatureSet) {
        for child in &self.children {
            match child {
                Node::Feature(f) => {
                    out.insert(Label::intern(f.positive));
                    if !f.negative.is_empty() {
                        out.insert(Label::intern(f.negative));
                    }
                }
                Node::Group(g) => g.collect_features(out),
            }
        }
    }

    /// The feature node carrying `label`, if any.
    pub fn find_feature(&self, label: &str) -> Option<&FeatureNode> {
        for child in &self.children {
            match child {
                Node::Feature(f) if f.holds(label) => return Some(f),
                Node::Feature(_) => {}
                Node::Group(g) => {
                    if let Some(found) = g.find_feature(label) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// The group node directly holding `label`'s feature node.
    pub fn find_parent(&self, label: &str) -> Option<&GeometryNode> {
        for child in &self.children {
            match child {
                Node::Feature(f) if f.holds(label) => return Some(self),
                Node::Feature(_) => {}
                Node::Group(g) => {
                    if let Some(found) = g.find_parent(label) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// Labels mutually exclusive with `label`.
    ///
    /// These are the labels of all feature nodes under `label`'s parent
    /// (including the other polarity of `label`'s own node), minus `label`
    /// itself. Unknown labels have no siblings.
    pub fn siblings_of(&self, label: &str) -> FeatureSet {
        let mut result = FeatureSet::new();
        let Some(parent) = self.find_parent(label) else {
            return result;
        };
        for child in &parent.children {
            if let Node::Feature(f) = child {
                if f.positive != label {
                    result.insert(Label::intern(f.positive));
                }
                if !f.negative.is_empty() && f.negative != label {
                    result.insert(Label::intern(f.negative));
                }
            }
        }
        result
    }

    /// Path of node names from this node down to `label` (inclusive).
    fn path_to(&self, label: &str) -> Option<Vec<&'static str>> {
        for child in &self.children {
            match child {
                Node::Feature(f) if f.holds(label) => {
                    let value = if f.positive == label { f.positive } else { f.negative };
                    return Some(vec![self.name, f.name, value]);
                }
                Node::Feature(_) => {}
                Node::Group(g) => {
                    if let Some(mut sub) = g.path_to(label) {
                        let mut path = vec![self.name];
                        path.append(&mut sub);
                        return Some(path);
                    }
                }
            }
        }
        None
    }

    /// Tree depth of `label`: edges from the root to the label.
    pub fn depth_of(&self, label: &str) -> Option<usize> {
        self.path_to(label).map(|path| path.len() - 1)
    }

    /// Tree-edge distance between two labels.
    ///
    /// `depth(a) + depth(b) - 2 * depth(LCA(a, b))`; identical labels are
    /// at distance 0 and unknown labels at [`UNKNOWN_DISTANCE`].
    pub fn feature_distance(&self, a: &str, b: &str) -> usize {
        if a == b {
            return 0;
        }
        let (Some(path_a), Some(path_b)) = (self.path_to(a), self.path_to(b)) else {
            return UNKNOWN_DISTANCE;
        };
        let common = path_a
            .iter()
            .zip(path_b.iter())
            .take_while(|(x, y)| x == y)
            .count();
        (path_a.len() - common) + (path_b.len() - common)
    }

    /// Depth-weighted distance between two feature sets, in `[0, 1]`.
    ///
    /// Each label in the symmetric difference contributes
    /// `1 / (1 + depth)`, normalized by the total weight of the union, so
    /// identical sets are at 0 and disjoint sets at 1. Labels the tree
    /// does not know get depth 0 (full weight).
    pub fn sound_distance(&self, a: &FeatureSet, b: &FeatureSet) -> f64 {
        if a == b {
            return 0.0;
        }
        let weight = |label: Label| -> f64 {
            let depth = self.depth_of(label.as_str()).unwrap_or(0);
            1.0 / (1.0 + depth as f64)
        };
        let union = a.union(b);
        let total: f64 = union.iter().map(weight).sum();
        if total == 0.0 {
            return 0.0;
        }
        let diff: f64 = a.symmetric_difference(b).iter().map(weight).sum();
        diff / total
    }
}

/// The process-wide geometry tree.
pub fn geometry() -> &'static GeometryNode {
    static GEOMETRY: OnceLock<GeometryNode> = OnceLock::new();
    GEOMETRY.get_or_init(build_geometry)
}

/// Build the Clements & Hume style tree.
///
/// Sibling feature nodes encode mutual exclusivity, so co-occurring
/// properties (laterality and manner, nasalization and length, ...) live
/// under separate group nodes while n-ary contrasts (place, height,
/// manner of articulation) sit together as privative siblings.
fn build_geometry() -> GeometryNode {
    GeometryNode {
        name: "Root",
        children: vec![
            group("Major", vec![feat("type", "consonant", "vowel")]),
            group(
                "Laryngeal",
                vec![
                    group("Voicing", vec![feat("voice", "voiced", "voiceless")]),
                    group(
                        "Glottis",
                        vec![
                            priv_feat("spread_glottis", "aspirated"),
                            priv_feat("constricted_glottis", "glottalized"),
                            priv_feat("breathy_voice", "breathy"),
                            priv_feat("creaky_voice", "creaky"),
                        ],
                    ),
                ],
            ),
            group(
                "Manner",
                vec![
                    group(
                        "Stricture",
                        vec![
                            priv_feat("stop_closure", "stop"),
                            priv_feat("frication", "fricative"),
                            priv_feat("delayed_release", "affricate"),
                            priv_feat("nasal_airflow", "nasal"),
                            priv_feat("trilling", "trill"),
                            priv_feat("flapping", "tap"),
                            priv_feat("approximation", "approximant"),
                            priv_feat("velaric_airstream", "click"),
                            priv_feat("implosion", "implosive"),
                        ],
                    ),
                    group("Laterality", vec![priv_feat("lateral_airflow", "lateral")]),
                    group("Sibilance", vec![priv_feat("strident", "sibilant")]),
                    group(
                        "Syllabicity",
                        vec![feat("syllabic_role", "syllabic", "non-syllabic")],
                    ),
                ],
            ),
            group(
                "Place",
                vec![
                    group(
                        "Articulator",
                        vec![
                            priv_feat("labial_place", "bilabial"),
                            priv_feat("labiodental_place", "labio-dental"),
                            priv_feat("dental_place", "dental"),
                            priv_feat("alveolar_place", "alveolar"),
                            priv_feat("postalveolar_place", "post-alveolar"),
                            priv_feat("retroflex_place", "retroflex"),
                            priv_feat("alveolopalatal_place", "alveolo-palatal"),
                            priv_feat("palatal_place", "palatal"),
                            priv_feat("velar_place", "velar"),
                            priv_feat("labiovelar_place", "labio-velar"),
                            priv_feat("uvular_place", "uvular"),
                            priv_feat("pharyngeal_place", "pharyngeal"),
                            priv_feat("glottal_place", "glottal"),
                        ],
                    ),
                    group("Labial", vec![feat("round", "rounded", "unrounded")]),
                ],
            ),
            group(
                "Dorsal",
                vec![
                    group(
                        "Height",
                        vec![
                            priv_feat("close_height", "close"),
                            priv_feat("near_close_height", "near-close"),
                            priv_feat("close_mid_height", "close-mid"),
                            priv_feat("mid_height", "mid"),
                            priv_feat("open_mid_height", "open-mid"),
                            priv_feat("near_open_height", "near-open"),
                            priv_feat("open_height", "open"),
                        ],
                    ),
                    group(
                        "Backness",
                        vec![
                            priv_feat("front_backness", "front"),
                            priv_feat("near_front_backness", "near-front"),
                            priv_feat("central_backness", "central"),
                            priv_feat("near_back_backness", "near-back"),
                            priv_feat("back_backness", "back"),
                        ],
                    ),
                ],
            ),
            group(
                "Prosodic",
                vec![
                    group("Duration", vec![priv_feat("length", "long")]),
                    group("Nasalization", vec![priv_feat("nasalization", "nasalized")]),
                    group(
                        "SecondaryArticulation",
                        vec![
                            priv_feat("labialization", "labialized"),
                            priv_feat("palatalization", "palatalized"),
                            priv_feat("velarization", "velarized"),
                            priv_feat("pharyngealization", "pharyngealized"),
                        ],
                    ),
                    group("Airstream", vec![priv_feat("ejection", "ejective")]),
                    group(
                        "Stress",
                        vec![
                            priv_feat("primary_stress", "primary-stress"),
                            priv_feat("secondary_stress", "secondary-stress"),
                        ],
                    ),
                ],
            ),
        ],
    }
}
