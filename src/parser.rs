//! Parsing of sound-change rules and segment sequences.
//!
//! A rule is written `ANTE > POST / CONTEXT` with whitespace-separated
//! tokens (`→` and `->` are accepted as arrows, the context is optional).
//! Sequences are whitespace-separated graphemes and `#` boundary markers.
//!
//! Sequence parsing is total: unknown graphemes become sounds with empty
//! feature sets. Rule parsing enforces the structural invariants up front —
//! focus placement, correspondence-set arity, back-reference ranges,
//! quantifier restrictions — and reports violations with the index of the
//! offending source token.

use crate::intern::FeatureSet;
use crate::system::{self, FeatureSystem};
use crate::types::{
    Boundary, Element, ModifierList, ModifierOp, Quantifier, Rule, Sequence, Sound, SyllableRole,
    Token,
};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Errors raised while parsing a rule.
///
/// `index` fields are 0-based positions into the whitespace-separated
/// token stream of the normalized rule text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// No `>` / `→` / `->` between ante and post.
    #[error("rule {rule:?} has no arrow separating ante and post")]
    MissingArrow {
        /// The offending rule text.
        rule: String,
    },

    /// A rule side has no tokens at all.
    #[error("rule {rule:?} has an empty ante or post")]
    EmptySide {
        /// The offending rule text.
        rule: String,
    },

    /// The ante cannot consume any input (e.g. `:null:` alone).
    #[error("token {index}: ante consumes no input; insertion rules are not supported")]
    InsertionAnte {
        /// Index of the first ante token.
        index: usize,
    },

    /// `_` appeared outside the context.
    #[error("token {index}: focus `_` is only legal in context")]
    FocusOutsideContext {
        /// Offending token index.
        index: usize,
    },

    /// The context contains more than one focus.
    #[error("token {index}: context has more than one focus")]
    MultipleFocus {
        /// Offending token index.
        index: usize,
    },

    /// A context was given without a focus.
    #[error("context has no focus `_`")]
    MissingFocus,

    /// Brackets or braces do not balance within a token.
    #[error("token {index}: unbalanced brackets in {token:?}")]
    UnbalancedBrackets {
        /// Offending token index.
        index: usize,
        /// The token text.
        token: String,
    },

    /// An alternative list (`{...}` or `a|b`) has an empty arm.
    #[error("token {index}: empty alternative in {token:?}")]
    EmptyAlternative {
        /// Offending token index.
        index: usize,
        /// The token text.
        token: String,
    },

    /// An alternative is not a primitive token.
    #[error("token {index}: alternatives must be primitive tokens, got {token:?}")]
    NonPrimitiveAlternative {
        /// Offending token index.
        index: usize,
        /// The token text.
        token: String,
    },

    /// A back-reference is syntactically malformed.
    #[error("token {index}: malformed back-reference {token:?}")]
    MalformedBackRef {
        /// Offending token index.
        index: usize,
        /// The token text.
        token: String,
    },

    /// A back-reference points past the available ante positions.
    #[error("token {index}: back-reference @{reference} exceeds {limit} available position(s)")]
    BackRefOutOfRange {
        /// Offending token index.
        index: usize,
        /// The 1-based reference as written.
        reference: usize,
        /// Number of positions that were referable.
        limit: usize,
    },

    /// A quantifier was applied to a set or a choice.
    #[error("token {index}: quantifier on a set or choice in {token:?}")]
    QuantifierOnGroup {
        /// Offending token index.
        index: usize,
        /// The token text.
        token: String,
    },

    /// Ante and post correspondence sets do not pair up.
    #[error("token {index}: correspondence sets in ante and post do not pair up")]
    SetArityMismatch {
        /// Offending token index.
        index: usize,
    },

    /// A feature modifier list is empty or has an empty entry.
    #[error("token {index}: empty feature modifier in {token:?}")]
    EmptyModifier {
        /// Offending token index.
        index: usize,
        /// The token text.
        token: String,
    },

    /// A `_.` focus suffix is not one of onset/nucleus/coda.
    #[error("token {index}: unknown syllable position in {token:?}")]
    UnknownSyllablePosition {
        /// Offending token index.
        index: usize,
        /// The token text.
        token: String,
    },

    /// A choice (`a|b`) appeared in post; only correspondence sets pair
    /// replacements with alternatives.
    #[error("token {index}: choices are not allowed in post; use a correspondence set")]
    ChoiceInPost {
        /// Offending token index.
        index: usize,
    },
}

/// Result alias for parse operations.
pub type Result<T> = std::result::Result<T, ParseError>;

// ============================================================================
// Sequence parsing
// ============================================================================

/// Parse whitespace-separated segment text into a sequence.
///
/// The text is NFC-normalized and split on whitespace; `#` becomes a
/// boundary and everything else resolves through the feature system.
/// Unknown graphemes yield sounds with empty features — this function
/// never fails.
pub fn parse_sequence(text: &str, system: &dyn FeatureSystem) -> Sequence {
    let normalized: String = text.nfc().collect();
    normalized
        .split_whitespace()
        .map(|token| {
            if token == "#" {
                Element::Boundary(Boundary::word())
            } else {
                Element::Sound(system::sound(token, system))
            }
        })
        .collect()
}

// ============================================================================
// Rule parsing
// ============================================================================

/// Which rule part a token belongs to; contexts admit the focus.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Part {
    Ante,
    Post,
    Context,
}

/// Parse rule text into an immutable [`Rule`].
///
/// The stored `source` is the whitespace-normalized text, so a rule that
/// parses satisfies `parse_rule(r).source == normalize_ws(r)`.
pub fn parse_rule(text: &str, system: &dyn FeatureSystem) -> Result<Rule> {
    let source = normalize_ws(text);

    let (rule_part, context_part) = match source.split_once(" / ") {
        Some((rule, context)) => (rule, Some(context)),
        None => (source.as_str(), None),
    };

    let (ante_text, post_text) = split_arrow(rule_part).ok_or_else(|| ParseError::MissingArrow {
        rule: source.clone(),
    })?;

    if ante_text.is_empty() || post_text.is_empty() {
        return Err(ParseError::EmptySide {
            rule: source.clone(),
        });
    }

    let mut index = 0usize;
    let (ante, ante_indices) = parse_part(ante_text, Part::Ante, &mut index, system)?;
    index += 1; // the arrow occupies one source token
    let (post, post_indices) = parse_part(post_text, Part::Post, &mut index, system)?;
    let (context, context_indices) = match context_part {
        Some(context_text) => {
            index += 1; // the slash occupies one source token
            let (tokens, token_indices) = parse_part(context_text, Part::Context, &mut index, system)?;
            validate_context(&tokens, &token_indices)?;
            (Some(tokens), token_indices)
        }
        None => (None, Vec::new()),
    };

    validate_ante(&ante, &ante_indices)?;
    validate_post(&post, &post_indices)?;
    validate_backrefs(
        &ante,
        &ante_indices,
        &post,
        &post_indices,
        context.as_deref(),
        &context_indices,
    )?;
    validate_sets(&ante, &post, &post_indices)?;

    Ok(Rule {
        source,
        ante,
        post,
        context,
    })
}

/// Collapse runs of whitespace to single spaces and trim.
fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `ANTE <arrow> POST`, accepting `>`, `→`, and `->`.
fn split_arrow(text: &str) -> Option<(&str, &str)> {
    for arrow in [" > ", " → ", " -> "] {
        if let Some((ante, post)) = text.split_once(arrow) {
            return Some((ante.trim(), post.trim()));
        }
    }
    None
}

/// Parse one rule part into tokens, tracking source-token indices.
fn parse_part(
    text: &str,
    part: Part,
    index: &mut usize,
    system: &dyn FeatureSystem,
) -> Result<(Vec<Token>, Vec<usize>)> {
    let mut tokens = Vec::new();
    let mut indices = Vec::new();
    for word in text.split_whitespace() {
        let parsed = parse_token(word, *index, part, system)?;
        for token in parsed {
            tokens.push(token);
            indices.push(*index);
        }
        *index += 1;
    }
    Ok((tokens, indices))
}

/// Parse a single source token. `_.onset` and friends expand into two
/// tokens (focus plus syllable condition).
fn parse_token(word: &str, index: usize, part: Part, system: &dyn FeatureSystem) -> Result<Vec<Token>> {
    // Focus and focus-derived syllable conditions.
    if word == "_" || word.starts_with("_.") {
        if part != Part::Context {
            return Err(ParseError::FocusOutsideContext { index });
        }
        return match word {
            "_" => Ok(vec![Token::Focus]),
            "_.onset" => Ok(vec![Token::Focus, Token::SyllableCond(SyllableRole::Onset)]),
            "_.nucleus" => Ok(vec![Token::Focus, Token::SyllableCond(SyllableRole::Nucleus)]),
            "_.coda" => Ok(vec![Token::Focus, Token::SyllableCond(SyllableRole::Coda)]),
            _ => Err(ParseError::UnknownSyllablePosition {
                index,
                token: word.to_owned(),
            }),
        };
    }

    if word == ":null:" {
        return Ok(vec![Token::Empty]);
    }
    if word == "#" {
        return Ok(vec![Token::Boundary(Boundary::word())]);
    }

    // Quantifier suffix binds outermost: `C+`, `V?`, `!N+`.
    if let Some(stripped) = strip_quantifier(word) {
        let (inner_text, quantifier) = stripped;
        if inner_text.starts_with('{') || inner_text.contains('|') {
            return Err(ParseError::QuantifierOnGroup {
                index,
                token: word.to_owned(),
            });
        }
        let inner = if let Some(negated) = inner_text.strip_prefix('!') {
            Token::Negation(Box::new(parse_primitive(negated, index, system)?))
        } else {
            parse_primitive(inner_text, index, system)?
        };
        return Ok(vec![Token::Quantified {
            inner: Box::new(inner),
            quantifier,
        }]);
    }

    // Correspondence sets: `{p|b}`.
    if let Some(rest) = word.strip_prefix('{') {
        let inner = rest.strip_suffix('}').ok_or_else(|| ParseError::UnbalancedBrackets {
            index,
            token: word.to_owned(),
        })?;
        let choices = parse_alternatives(inner, index, word, system)?;
        return Ok(vec![Token::Set(choices)]);
    }

    // Negation binds before the pipe: `!p|b` negates the whole choice.
    if let Some(rest) = word.strip_prefix('!') {
        if rest.is_empty() {
            return Err(ParseError::EmptyAlternative {
                index,
                token: word.to_owned(),
            });
        }
        let inner = if rest.contains('|') {
            Token::Choice(parse_alternatives(rest, index, word, system)?)
        } else {
            parse_primitive(rest, index, system)?
        };
        return Ok(vec![Token::Negation(Box::new(inner))]);
    }

    // Choices: `p|b`.
    if word.contains('|') {
        let choices = parse_alternatives(word, index, word, system)?;
        return Ok(vec![Token::Choice(choices)]);
    }

    Ok(vec![parse_primitive(word, index, system)?])
}

/// Strip a trailing `+` or `?` quantifier, if any.
fn strip_quantifier(word: &str) -> Option<(&str, Quantifier)> {
    if word.len() < 2 {
        return None;
    }
    if let Some(inner) = word.strip_suffix('+') {
        return Some((inner, Quantifier::OneOrMore));
    }
    if let Some(inner) = word.strip_suffix('?') {
        return Some((inner, Quantifier::Optional));
    }
    None
}

/// Split a `|`-chain and parse every arm as a primitive.
fn parse_alternatives(
    text: &str,
    index: usize,
    word: &str,
    system: &dyn FeatureSystem,
) -> Result<Vec<Token>> {
    let mut choices = Vec::new();
    for arm in text.split('|') {
        if arm.is_empty() {
            return Err(ParseError::EmptyAlternative {
                index,
                token: word.to_owned(),
            });
        }
        if arm.contains(['{', '}', '!']) || arm.ends_with('+') || arm.ends_with('?') || arm == "_" {
            return Err(ParseError::NonPrimitiveAlternative {
                index,
                token: word.to_owned(),
            });
        }
        choices.push(parse_primitive(arm, index, system)?);
    }
    if choices.is_empty() {
        return Err(ParseError::EmptyAlternative {
            index,
            token: word.to_owned(),
        });
    }
    Ok(choices)
}

/// Parse a primitive token: boundary, back-reference, sound class, or
/// grapheme (the last two with optional `[...]` feature modifiers).
fn parse_primitive(word: &str, index: usize, system: &dyn FeatureSystem) -> Result<Token> {
    if word == "#" {
        return Ok(Token::Boundary(Boundary::word()));
    }
    if word == ":null:" {
        return Ok(Token::Empty);
    }

    if let Some(rest) = word.strip_prefix('@') {
        let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let digits = &rest[..digits_end];
        let reference: usize = digits.parse().map_err(|_| ParseError::MalformedBackRef {
            index,
            token: word.to_owned(),
        })?;
        if reference == 0 {
            return Err(ParseError::MalformedBackRef {
                index,
                token: word.to_owned(),
            });
        }
        let tail = &rest[digits_end..];
        let mods = if tail.is_empty() {
            None
        } else {
            Some(parse_modifier_token(tail, index, word)?)
        };
        return Ok(Token::BackRef {
            index: reference - 1,
            mods,
        });
    }

    let (base, mods) = split_modifier(word, index)?;
    let mods = match mods {
        Some(text) => Some(parse_modifier_token(text, index, word)?),
        None => None,
    };

    // Sound classes: leading ASCII uppercase and known to the system.
    if base.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        if let Some(class_features) = system.class_features(base) {
            let features = match &mods {
                Some(mods) => system::apply_modifiers(&class_features, mods, system),
                None => class_features,
            };
            return Ok(Token::Segment(Sound::partial(base, features)));
        }
    }

    // Plain grapheme, possibly refined by modifiers.
    let base_features = system
        .grapheme_to_features(base)
        .unwrap_or_else(FeatureSet::new);
    let sound = match &mods {
        Some(mods) => {
            let features = system::apply_modifiers(&base_features, mods, system);
            let grapheme = system
                .features_to_grapheme(&features)
                .unwrap_or_else(|| base.to_owned());
            Sound::new(grapheme, features)
        }
        None => Sound::new(base, base_features),
    };
    Ok(Token::Segment(sound))
}

/// Split `base[mods]` into the base text and the bracketed modifier text.
fn split_modifier(word: &str, index: usize) -> Result<(&str, Option<&str>)> {
    match word.find('[') {
        None => {
            if word.contains(']') {
                return Err(ParseError::UnbalancedBrackets {
                    index,
                    token: word.to_owned(),
                });
            }
            Ok((word, None))
        }
        Some(open) => {
            if !word.ends_with(']') {
                return Err(ParseError::UnbalancedBrackets {
                    index,
                    token: word.to_owned(),
                });
            }
            Ok((&word[..open], Some(&word[open..])))
        }
    }
}

/// Parse a `[+f,-g,h]` modifier token into a [`ModifierList`].
fn parse_modifier_token(text: &str, index: usize, word: &str) -> Result<ModifierList> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| ParseError::UnbalancedBrackets {
            index,
            token: word.to_owned(),
        })?;
    let mut ops = Vec::new();
    for entry in inner.split(',') {
        let entry = entry.trim();
        if entry.is_empty() || entry == "+" || entry == "-" {
            return Err(ParseError::EmptyModifier {
                index,
                token: word.to_owned(),
            });
        }
        let op = if let Some(label) = entry.strip_prefix('-') {
            ModifierOp::Remove(label.into())
        } else if let Some(label) = entry.strip_prefix('+') {
            ModifierOp::Add(label.into())
        } else {
            ModifierOp::Add(entry.into())
        };
        ops.push(op);
    }
    if ops.is_empty() {
        return Err(ParseError::EmptyModifier {
            index,
            token: word.to_owned(),
        });
    }
    Ok(ModifierList::new(ops))
}

// ============================================================================
// Validation
// ============================================================================

fn validate_context(tokens: &[Token], indices: &[usize]) -> Result<()> {
    let mut seen = false;
    for (token, &index) in tokens.iter().zip(indices) {
        if matches!(token, Token::Focus) {
            if seen {
                return Err(ParseError::MultipleFocus { index });
            }
            seen = true;
        }
    }
    if !seen {
        return Err(ParseError::MissingFocus);
    }
    Ok(())
}

fn validate_ante(ante: &[Token], indices: &[usize]) -> Result<()> {
    let min_width: usize = ante.iter().map(|t| t.width().0).sum();
    if min_width == 0 {
        return Err(ParseError::InsertionAnte {
            index: indices.first().copied().unwrap_or(0),
        });
    }
    Ok(())
}

fn validate_post(post: &[Token], indices: &[usize]) -> Result<()> {
    for (token, &index) in post.iter().zip(indices) {
        if matches!(token, Token::Choice(_)) {
            return Err(ParseError::ChoiceInPost { index });
        }
    }
    Ok(())
}

/// Back-references must point at ante positions that already exist: within
/// the ante itself only earlier positions are referable; in post and
/// context the whole ante is.
fn validate_backrefs(
    ante: &[Token],
    ante_indices: &[usize],
    post: &[Token],
    post_indices: &[usize],
    context: Option<&[Token]>,
    context_indices: &[usize],
) -> Result<()> {
    for (pos, (token, &index)) in ante.iter().zip(ante_indices).enumerate() {
        if let Token::BackRef { index: reference, .. } = token {
            if *reference >= pos {
                return Err(ParseError::BackRefOutOfRange {
                    index,
                    reference: reference + 1,
                    limit: pos,
                });
            }
        }
    }
    let check_part = |tokens: &[Token], indices: &[usize]| -> Result<()> {
        for (token, &index) in tokens.iter().zip(indices) {
            if let Token::BackRef { index: reference, .. } = token {
                if *reference >= ante.len() {
                    return Err(ParseError::BackRefOutOfRange {
                        index,
                        reference: reference + 1,
                        limit: ante.len(),
                    });
                }
            }
        }
        Ok(())
    };
    check_part(post, post_indices)?;
    if let Some(context) = context {
        check_part(context, context_indices)?;
    }
    Ok(())
}

/// Correspondence sets in ante and post must pair up one-to-one with the
/// same number of alternatives.
fn validate_sets(ante: &[Token], post: &[Token], post_indices: &[usize]) -> Result<()> {
    let ante_sets: Vec<usize> = ante
        .iter()
        .filter_map(|t| match t {
            Token::Set(choices) => Some(choices.len()),
            _ => None,
        })
        .collect();
    let post_sets: Vec<(usize, usize)> = post
        .iter()
        .zip(post_indices)
        .filter_map(|(t, &index)| match t {
            Token::Set(choices) => Some((choices.len(), index)),
            _ => None,
        })
        .collect();

    if ante_sets.len() != post_sets.len() {
        let index = post_sets
            .last()
            .map(|(_, i)| *i)
            .unwrap_or_else(|| post_indices.first().copied().unwrap_or(0));
        return Err(ParseError::SetArityMismatch { index });
    }
    for (ante_arity, (post_arity, index)) in ante_sets.iter().zip(&post_sets) {
        if ante_arity != post_arity {
            return Err(ParseError::SetArityMismatch { index: *index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::get_system;
    use crate::types::render_sequence;

    fn sys() -> std::sync::Arc<dyn FeatureSystem> {
        get_system(None).unwrap()
    }

    #[test]
    fn test_parse_sequence_roundtrip() {
        let system = sys();
        let seq = parse_sequence("# p a t a #", system.as_ref());
        assert_eq!(seq.len(), 6);
        assert!(seq[0].is_boundary());
        assert_eq!(render_sequence(&seq), "# p a t a #");
    }

    #[test]
    fn test_parse_sequence_unknown_grapheme() {
        let system = sys();
        let seq = parse_sequence("# ß a #", system.as_ref());
        let sound = seq[1].as_sound().unwrap();
        assert!(sound.features.is_empty());
        assert!(!sound.partial);
    }

    #[test]
    fn test_parse_simple_rule() {
        let system = sys();
        let rule = parse_rule("p > b", system.as_ref()).unwrap();
        assert_eq!(rule.source, "p > b");
        assert_eq!(rule.ante.len(), 1);
        assert_eq!(rule.post.len(), 1);
        assert!(rule.context.is_none());
    }

    #[test]
    fn test_parse_rule_normalizes_whitespace() {
        let system = sys();
        let rule = parse_rule("  p   >  b  /  V _ V ", system.as_ref()).unwrap();
        assert_eq!(rule.source, "p > b / V _ V");
    }

    #[test]
    fn test_arrow_variants() {
        let system = sys();
        for text in ["p > b", "p → b", "p -> b"] {
            let rule = parse_rule(text, system.as_ref()).unwrap();
            assert_eq!(rule.source, text);
        }
        assert!(matches!(
            parse_rule("p b", system.as_ref()),
            Err(ParseError::MissingArrow { .. })
        ));
    }

    #[test]
    fn test_context_with_focus() {
        let system = sys();
        let rule = parse_rule("p > b / V _ V", system.as_ref()).unwrap();
        let (left, right) = rule.context_split().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
        match &left[0] {
            Token::Segment(sound) => assert!(sound.partial),
            other => panic!("expected class segment, got {other:?}"),
        }
    }

    #[test]
    fn test_focus_outside_context_rejected() {
        let system = sys();
        assert!(matches!(
            parse_rule("_ > b", system.as_ref()),
            Err(ParseError::FocusOutsideContext { index: 0 })
        ));
        assert!(matches!(
            parse_rule("p > _", system.as_ref()),
            Err(ParseError::FocusOutsideContext { index: 2 })
        ));
    }

    #[test]
    fn test_context_focus_count() {
        let system = sys();
        assert!(matches!(
            parse_rule("p > b / V V", system.as_ref()),
            Err(ParseError::MissingFocus)
        ));
        assert!(matches!(
            parse_rule("p > b / _ V _", system.as_ref()),
            Err(ParseError::MultipleFocus { .. })
        ));
    }

    #[test]
    fn test_syllable_condition_tokens() {
        let system = sys();
        let rule = parse_rule("C > @1[+voiced] / _.onset", system.as_ref()).unwrap();
        let context = rule.context.as_deref().unwrap();
        assert_eq!(context.len(), 2);
        assert!(matches!(context[0], Token::Focus));
        assert!(matches!(context[1], Token::SyllableCond(SyllableRole::Onset)));
        assert!(rule.uses_syllable_conditions());
    }

    #[test]
    fn test_backref_with_modifier() {
        let system = sys();
        let rule = parse_rule("C > @1[+voiced] / V _ V", system.as_ref()).unwrap();
        match &rule.post[0] {
            Token::BackRef { index: 0, mods: Some(mods) } => {
                assert_eq!(mods.to_string(), "[+voiced]");
            }
            other => panic!("expected backref, got {other:?}"),
        }
    }

    #[test]
    fn test_backref_out_of_range() {
        let system = sys();
        assert!(matches!(
            parse_rule("p > @2", system.as_ref()),
            Err(ParseError::BackRefOutOfRange { reference: 2, .. })
        ));
        // Within the ante only earlier positions are referable.
        assert!(matches!(
            parse_rule("@1 t > x y", system.as_ref()),
            Err(ParseError::BackRefOutOfRange { reference: 1, .. })
        ));
        assert!(parse_rule("t @1 > x y", system.as_ref()).is_ok());
    }

    #[test]
    fn test_set_arity_checked() {
        let system = sys();
        assert!(parse_rule("{p|b} > {f|v}", system.as_ref()).is_ok());
        assert!(matches!(
            parse_rule("{p|b} > {f|v|w}", system.as_ref()),
            Err(ParseError::SetArityMismatch { .. })
        ));
        assert!(matches!(
            parse_rule("{p|b} > f", system.as_ref()),
            Err(ParseError::SetArityMismatch { .. })
        ));
    }

    #[test]
    fn test_quantifiers() {
        let system = sys();
        let rule = parse_rule("C+ > :null: / _ #", system.as_ref()).unwrap();
        assert!(matches!(
            rule.ante[0],
            Token::Quantified { quantifier: Quantifier::OneOrMore, .. }
        ));
        let rule = parse_rule("V? t > t", system.as_ref()).unwrap();
        assert!(matches!(
            rule.ante[0],
            Token::Quantified { quantifier: Quantifier::Optional, .. }
        ));
    }

    #[test]
    fn test_quantifier_on_group_rejected() {
        let system = sys();
        assert!(matches!(
            parse_rule("{p|b}+ > f", system.as_ref()),
            Err(ParseError::QuantifierOnGroup { .. })
        ));
        assert!(matches!(
            parse_rule("p|b+ > f", system.as_ref()),
            Err(ParseError::QuantifierOnGroup { .. })
        ));
    }

    #[test]
    fn test_negation_binds_before_pipe() {
        let system = sys();
        let rule = parse_rule("!p|b > x", system.as_ref()).unwrap();
        match &rule.ante[0] {
            Token::Negation(inner) => assert!(matches!(**inner, Token::Choice(_))),
            other => panic!("expected negation, got {other:?}"),
        }
    }

    #[test]
    fn test_choice_in_post_rejected() {
        let system = sys();
        assert!(matches!(
            parse_rule("p > f|v", system.as_ref()),
            Err(ParseError::ChoiceInPost { index: 2 })
        ));
    }

    #[test]
    fn test_insertion_ante_rejected() {
        let system = sys();
        assert!(matches!(
            parse_rule(":null: > p", system.as_ref()),
            Err(ParseError::InsertionAnte { .. })
        ));
    }

    #[test]
    fn test_class_with_modifier() {
        let system = sys();
        let rule = parse_rule("C[+voiced] > p", system.as_ref()).unwrap();
        match &rule.ante[0] {
            Token::Segment(sound) => {
                assert!(sound.partial);
                assert!(sound.features.contains("voiced".into()));
                assert!(sound.features.contains("consonant".into()));
            }
            other => panic!("expected segment, got {other:?}"),
        }
    }

    #[test]
    fn test_grapheme_with_modifier_rederives_grapheme() {
        let system = sys();
        let rule = parse_rule("t[+voiced] > t", system.as_ref()).unwrap();
        match &rule.ante[0] {
            Token::Segment(sound) => assert_eq!(sound.grapheme, "d"),
            other => panic!("expected segment, got {other:?}"),
        }
    }

    #[test]
    fn test_unbalanced_brackets() {
        let system = sys();
        assert!(matches!(
            parse_rule("t[+voiced > t", system.as_ref()),
            Err(ParseError::UnbalancedBrackets { .. })
        ));
        assert!(matches!(
            parse_rule("{p|b > f", system.as_ref()),
            Err(ParseError::UnbalancedBrackets { .. })
        ));
    }

    #[test]
    fn test_uppercase_unknown_class_is_grapheme() {
        let system = sys();
        let rule = parse_rule("Z > s", system.as_ref()).unwrap();
        match &rule.ante[0] {
            Token::Segment(sound) => {
                assert!(!sound.partial);
                assert!(sound.features.is_empty());
            }
            other => panic!("expected segment, got {other:?}"),
        }
    }
}
