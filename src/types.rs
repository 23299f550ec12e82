//! Core value types: sounds, boundaries, rule tokens, rules, match results.
//!
//! Everything here is an immutable value. Construction happens during
//! parsing or resource loading; afterwards values are only shared and
//! compared. The matcher and applier take these by reference and build new
//! values for their results.

use crate::intern::{FeatureSet, Label};
use std::fmt;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// A phonological segment.
///
/// A concrete sound (`partial == false`) matches only a segment with the
/// same grapheme or an identical feature set. A class-partial sound
/// (`partial == true`, e.g. `V` or `C`) matches any segment whose features
/// subsume the pattern's features.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Sound {
    /// Textual form of the segment (often a single IPA symbol).
    pub grapheme: String,
    /// Feature labels describing the segment.
    pub features: FeatureSet,
    /// Whether this is a class pattern matched by subsumption.
    pub partial: bool,
}

impl Sound {
    /// A concrete sound with the given grapheme and features.
    pub fn new(grapheme: impl Into<String>, features: FeatureSet) -> Self {
        Self {
            grapheme: grapheme.into(),
            features,
            partial: false,
        }
    }

    /// A class-partial sound whose features must subsume a match target.
    pub fn partial(grapheme: impl Into<String>, features: FeatureSet) -> Self {
        Self {
            grapheme: grapheme.into(),
            features,
            partial: true,
        }
    }
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.grapheme)
    }
}

/// A word or morpheme edge marker (canonically `#`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Boundary {
    /// The marker text.
    pub marker: String,
}

impl Boundary {
    /// The canonical word boundary.
    pub fn word() -> Self {
        Self {
            marker: "#".to_owned(),
        }
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Self::word()
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.marker)
    }
}

/// One element of a phonological sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Element {
    /// A segment.
    Sound(Sound),
    /// An edge marker.
    Boundary(Boundary),
}

impl Element {
    /// The contained sound, if this element is one.
    pub fn as_sound(&self) -> Option<&Sound> {
        match self {
            Element::Sound(s) => Some(s),
            Element::Boundary(_) => None,
        }
    }

    /// Whether this element is a boundary marker.
    pub fn is_boundary(&self) -> bool {
        matches!(self, Element::Boundary(_))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Sound(s) => s.fmt(f),
            Element::Boundary(b) => b.fmt(f),
        }
    }
}

/// An ordered sequence of elements.
pub type Sequence = Vec<Element>;

/// Render a sequence back to space-separated text.
///
/// The inverse of sequence parsing: graphemes and boundary markers joined
/// by single spaces.
pub fn render_sequence(sequence: &[Element]) -> String {
    let parts: Vec<String> = sequence.iter().map(|e| e.to_string()).collect();
    parts.join(" ")
}

// ============================================================================
// Feature modifiers
// ============================================================================

/// A single feature modifier operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum ModifierOp {
    /// Add a label (`+x` or bare `x`), displacing its geometric siblings.
    Add(Label),
    /// Remove exactly one label (`-x`).
    Remove(Label),
}

impl ModifierOp {
    /// Flip the operation: `+x` becomes `-x` and vice versa.
    pub fn inverted(self) -> Self {
        match self {
            ModifierOp::Add(l) => ModifierOp::Remove(l),
            ModifierOp::Remove(l) => ModifierOp::Add(l),
        }
    }
}

impl fmt::Display for ModifierOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierOp::Add(l) => write!(f, "+{l}"),
            ModifierOp::Remove(l) => write!(f, "-{l}"),
        }
    }
}

/// An ordered list of feature modifier operations, e.g. `[+voiced,-long]`.
///
/// Kept as an explicit AST so that backward application can invert the
/// modifiers as a pure transformation instead of rewriting strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ModifierList {
    /// Operations in source order.
    pub ops: Vec<ModifierOp>,
}

impl ModifierList {
    /// Build from a list of operations.
    pub fn new(ops: Vec<ModifierOp>) -> Self {
        Self { ops }
    }

    /// Invert every operation, for backward reconstruction.
    pub fn inverted(&self) -> Self {
        Self {
            ops: self.ops.iter().map(|op| op.inverted()).collect(),
        }
    }
}

impl fmt::Display for ModifierList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ops.iter().map(|op| op.to_string()).collect();
        write!(f, "[{}]", parts.join(","))
    }
}

// ============================================================================
// Rule pattern tokens
// ============================================================================

/// A quantifier suffix on a pattern token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Quantifier {
    /// `+`: one or more, matched greedily.
    OneOrMore,
    /// `?`: zero or one, zero tried first.
    Optional,
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::OneOrMore => f.write_str("+"),
            Quantifier::Optional => f.write_str("?"),
        }
    }
}

/// A syllable role used by syllable-position conditions and maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum SyllableRole {
    /// Consonant(s) before the nucleus.
    Onset,
    /// The sonority peak.
    Nucleus,
    /// Consonant(s) after the nucleus.
    Coda,
    /// A boundary marker (not part of any syllable).
    Boundary,
}

impl fmt::Display for SyllableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyllableRole::Onset => f.write_str("onset"),
            SyllableRole::Nucleus => f.write_str("nucleus"),
            SyllableRole::Coda => f.write_str("coda"),
            SyllableRole::Boundary => f.write_str("boundary"),
        }
    }
}

/// One token of a rule pattern (ante, post, or context).
///
/// A closed sum type: the matcher and applier dispatch over it
/// exhaustively, so adding a variant is a compile-time event everywhere
/// it matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Token {
    /// A concrete or class-partial segment.
    Segment(Sound),
    /// A boundary marker (`#`).
    Boundary(Boundary),
    /// The focus position (`_`), legal only in context.
    Focus,
    /// The empty token (`:null:`), a deletion target or insertion source.
    Empty,
    /// A back-reference (`@n`, 0-based index) with optional modifiers.
    BackRef {
        /// 0-based position into the ante pattern.
        index: usize,
        /// Optional feature modifiers applied on emission.
        mods: Option<ModifierList>,
    },
    /// Alternatives (`p|b`): the first matching one wins.
    Choice(Vec<Token>),
    /// A correspondence set (`{p|b}`), index-paired with its post twin.
    Set(Vec<Token>),
    /// A quantified token (`C+`, `V?`).
    Quantified {
        /// The quantified inner token (always primitive).
        inner: Box<Token>,
        /// The quantifier suffix.
        quantifier: Quantifier,
    },
    /// Single-element negation (`!p`, `!p|b`).
    Negation(Box<Token>),
    /// A syllable-position condition emitted by `_.onset` and friends.
    SyllableCond(SyllableRole),
}

impl Token {
    /// Whether this token consumes no input when matched.
    pub fn is_zero_width(&self) -> bool {
        matches!(self, Token::Focus | Token::Empty | Token::SyllableCond(_))
    }

    /// The minimum and maximum number of elements this token can consume.
    pub fn width(&self) -> (usize, usize) {
        match self {
            Token::Focus | Token::Empty | Token::SyllableCond(_) => (0, 0),
            Token::Quantified { quantifier, .. } => match quantifier {
                Quantifier::OneOrMore => (1, usize::MAX),
                Quantifier::Optional => (0, 1),
            },
            _ => (1, 1),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Segment(sound) => f.write_str(&sound.grapheme),
            Token::Boundary(b) => b.fmt(f),
            Token::Focus => f.write_str("_"),
            Token::Empty => f.write_str(":null:"),
            Token::BackRef { index, mods } => {
                write!(f, "@{}", index + 1)?;
                if let Some(mods) = mods {
                    mods.fmt(f)?;
                }
                Ok(())
            }
            Token::Choice(choices) => {
                let parts: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
                f.write_str(&parts.join("|"))
            }
            Token::Set(choices) => {
                let parts: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
                write!(f, "{{{}}}", parts.join("|"))
            }
            Token::Quantified { inner, quantifier } => write!(f, "{inner}{quantifier}"),
            Token::Negation(inner) => write!(f, "!{inner}"),
            Token::SyllableCond(role) => write!(f, "_.{role}"),
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// A parsed sound-change rule.
///
/// `source` preserves the (whitespace-normalized) rule text for diagnostics
/// and round-tripping. `context`, when present, contains exactly one
/// [`Token::Focus`] that partitions it into left and right environments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Rule {
    /// Normalized source text.
    pub source: String,
    /// Pattern to match.
    pub ante: Vec<Token>,
    /// Replacement pattern.
    pub post: Vec<Token>,
    /// Optional environment pattern.
    pub context: Option<Vec<Token>>,
}

impl Rule {
    /// Split the context at its focus into left and right environments.
    ///
    /// Returns `None` when the rule carries no context. The focus (and any
    /// syllable-position condition immediately derived from it) stays on
    /// the right side so that conditions gate the position following the
    /// matched pattern window.
    pub fn context_split(&self) -> Option<(&[Token], &[Token])> {
        let context = self.context.as_deref()?;
        let focus = context.iter().position(|t| matches!(t, Token::Focus))?;
        Some((&context[..focus], &context[focus + 1..]))
    }

    /// Whether any context token conditions on syllable position.
    pub fn uses_syllable_conditions(&self) -> bool {
        self.context
            .as_deref()
            .map(|tokens| tokens.iter().any(|t| matches!(t, Token::SyllableCond(_))))
            .unwrap_or(false)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ============================================================================
// Match results
// ============================================================================

/// The result of matching a pattern window against a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct MatchResult {
    /// Whether the whole pattern matched.
    pub matched: bool,
    /// Per-token captures: the consumed element, or `None` for zero-width
    /// tokens, negations, and failed optionals. Quantified tokens bind
    /// their first consumed element.
    pub bindings: Vec<Option<Element>>,
    /// Per-token matched set-alternative index; `Some` only for
    /// [`Token::Set`] positions.
    pub set_choices: Vec<Option<usize>>,
    /// Number of input elements consumed.
    pub span: usize,
}

impl MatchResult {
    /// The canonical failed match.
    pub fn failure() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound(g: &str, feats: &[&str]) -> Sound {
        Sound::new(g, FeatureSet::from_names(feats.iter().copied()))
    }

    #[test]
    fn test_sound_equality() {
        let a = sound("p", &["voiceless", "bilabial", "stop", "consonant"]);
        let b = sound("p", &["bilabial", "voiceless", "stop", "consonant"]);
        assert_eq!(a, b);
        assert_ne!(a, sound("b", &["voiced", "bilabial", "stop", "consonant"]));
    }

    #[test]
    fn test_render_sequence() {
        let seq = vec![
            Element::Boundary(Boundary::word()),
            Element::Sound(sound("a", &["vowel"])),
            Element::Sound(sound("p", &["consonant"])),
            Element::Boundary(Boundary::word()),
        ];
        assert_eq!(render_sequence(&seq), "# a p #");
    }

    #[test]
    fn test_modifier_inversion_roundtrip() {
        let mods = ModifierList::new(vec![
            ModifierOp::Add(Label::intern("voiced")),
            ModifierOp::Remove(Label::intern("long")),
        ]);
        assert_eq!(mods.to_string(), "[+voiced,-long]");
        assert_eq!(mods.inverted().to_string(), "[-voiced,+long]");
        assert_eq!(mods.inverted().inverted(), mods);
    }

    #[test]
    fn test_token_display_roundtrips_source_shape() {
        let tok = Token::Quantified {
            inner: Box::new(Token::Segment(Sound::partial(
                "C",
                FeatureSet::from_names(["consonant"]),
            ))),
            quantifier: Quantifier::OneOrMore,
        };
        assert_eq!(tok.to_string(), "C+");

        let neg = Token::Negation(Box::new(Token::Choice(vec![
            Token::Segment(sound("p", &[])),
            Token::Segment(sound("b", &[])),
        ])));
        assert_eq!(neg.to_string(), "!p|b");
    }

    #[test]
    fn test_context_split() {
        let rule = Rule {
            source: "p > b / V _ V".to_owned(),
            ante: vec![Token::Segment(sound("p", &[]))],
            post: vec![Token::Segment(sound("b", &[]))],
            context: Some(vec![
                Token::Segment(Sound::partial("V", FeatureSet::from_names(["vowel"]))),
                Token::Focus,
                Token::Segment(Sound::partial("V", FeatureSet::from_names(["vowel"]))),
            ]),
        };
        let (left, right) = rule.context_split().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
    }
}
