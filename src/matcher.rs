//! Pattern matching of rule tokens against element sequences.
//!
//! The matcher walks a token pattern left to right, binding tokens to
//! consecutive elements starting at an offset. Quantifiers backtrack
//! depth-first (greedy for `+`, zero-first for `?`); negation consumes
//! exactly one element; choices and correspondence sets try their
//! alternatives in order, sets also recording which alternative matched.
//! Zero-width tokens (focus, empty, syllable conditions) gate positions
//! without consuming input.
//!
//! Everything operates on borrowed slices; the only allocation is the
//! returned [`MatchResult`].

use crate::syllable::SyllableMap;
use crate::system::{self, FeatureSystem};
use crate::types::{Element, MatchResult, Quantifier, Sound, Token};

/// Options threaded through a match.
pub struct MatchOptions<'a> {
    /// Feature system used for subsumption and modifier arithmetic.
    pub system: &'a dyn FeatureSystem,
    /// Syllable roles of the full sequence, when the pattern conditions on
    /// them.
    pub syllable_map: Option<&'a SyllableMap>,
    /// Absolute position in `sequence` where matching starts.
    pub offset: usize,
    /// Bindings of an already-matched ante pattern. Back-references inside
    /// context patterns resolve against these; when empty, back-references
    /// resolve against the bindings accumulated so far (ante-internal
    /// references to earlier positions).
    pub prior: &'a [Option<Element>],
    /// When set, the match must consume input up to exactly this absolute
    /// position; quantifiers backtrack until the span fits. Used for
    /// left-context evaluation, which must end at the match site.
    pub require_end: Option<usize>,
}

impl<'a> MatchOptions<'a> {
    /// Options for a plain match at `offset` with no prior bindings.
    pub fn new(system: &'a dyn FeatureSystem, offset: usize) -> Self {
        Self {
            system,
            syllable_map: None,
            offset,
            prior: &[],
            require_end: None,
        }
    }
}

/// Match `pattern` against `sequence` starting at `opts.offset`.
///
/// On success the result carries one binding per pattern token and the
/// number of consumed elements; on failure it is
/// [`MatchResult::failure`].
pub fn match_pattern(sequence: &[Element], pattern: &[Token], opts: &MatchOptions) -> MatchResult {
    let mut bindings: Vec<Option<Element>> = Vec::with_capacity(pattern.len());
    let mut set_choices: Vec<Option<usize>> = Vec::with_capacity(pattern.len());
    match backtrack(sequence, opts.offset, pattern, 0, &mut bindings, &mut set_choices, opts) {
        Some(end) => MatchResult {
            matched: true,
            bindings,
            set_choices,
            span: end - opts.offset,
        },
        None => MatchResult::failure(),
    }
}

/// Minimum and maximum number of elements a pattern can consume.
///
/// `+` quantifiers make the maximum unbounded; callers cap it at the
/// remaining input length.
pub fn pattern_width(pattern: &[Token]) -> (usize, usize) {
    let mut min = 0usize;
    let mut max = 0usize;
    for token in pattern {
        let (token_min, token_max) = token.width();
        min += token_min;
        max = max.saturating_add(token_max);
    }
    (min, max)
}

fn backtrack(
    sequence: &[Element],
    seq_idx: usize,
    pattern: &[Token],
    pat_idx: usize,
    bindings: &mut Vec<Option<Element>>,
    set_choices: &mut Vec<Option<usize>>,
    opts: &MatchOptions,
) -> Option<usize> {
    let Some(token) = pattern.get(pat_idx) else {
        if opts.require_end.is_some_and(|end| end != seq_idx) {
            return None;
        }
        return Some(seq_idx);
    };

    match token {
        Token::Focus | Token::Empty => {
            push_zero_width(sequence, seq_idx, pattern, pat_idx, bindings, set_choices, opts)
        }

        Token::SyllableCond(role) => {
            let holds = opts
                .syllable_map
                .is_some_and(|map| map.role(seq_idx) == Some(*role));
            if !holds {
                return None;
            }
            push_zero_width(sequence, seq_idx, pattern, pat_idx, bindings, set_choices, opts)
        }

        Token::Quantified { inner, quantifier } => match quantifier {
            Quantifier::OneOrMore => {
                // Count the consecutive matches, then give back one at a
                // time until the rest of the pattern fits.
                let mut run = 0usize;
                while seq_idx + run < sequence.len() {
                    if match_one(&sequence[seq_idx + run], inner, bindings, seq_idx + run, opts)
                        .is_none()
                    {
                        break;
                    }
                    run += 1;
                }
                for take in (1..=run).rev() {
                    bindings.push(Some(sequence[seq_idx].clone()));
                    set_choices.push(None);
                    if let Some(end) = backtrack(
                        sequence,
                        seq_idx + take,
                        pattern,
                        pat_idx + 1,
                        bindings,
                        set_choices,
                        opts,
                    ) {
                        return Some(end);
                    }
                    bindings.pop();
                    set_choices.pop();
                }
                None
            }
            Quantifier::Optional => {
                // Zero-width attempt first, then a single consumed element.
                bindings.push(None);
                set_choices.push(None);
                if let Some(end) =
                    backtrack(sequence, seq_idx, pattern, pat_idx + 1, bindings, set_choices, opts)
                {
                    return Some(end);
                }
                bindings.pop();
                set_choices.pop();

                if seq_idx < sequence.len() {
                    if match_one(&sequence[seq_idx], inner, bindings, seq_idx, opts).is_some() {
                        bindings.push(Some(sequence[seq_idx].clone()));
                        set_choices.push(None);
                        if let Some(end) = backtrack(
                            sequence,
                            seq_idx + 1,
                            pattern,
                            pat_idx + 1,
                            bindings,
                            set_choices,
                            opts,
                        ) {
                            return Some(end);
                        }
                        bindings.pop();
                        set_choices.pop();
                    }
                }
                None
            }
        },

        // Single-element tokens.
        _ => {
            let element = sequence.get(seq_idx)?;
            let (binding, set_choice) = match_one(element, token, bindings, seq_idx, opts)?;
            bindings.push(binding);
            set_choices.push(set_choice);
            if let Some(end) = backtrack(
                sequence,
                seq_idx + 1,
                pattern,
                pat_idx + 1,
                bindings,
                set_choices,
                opts,
            ) {
                return Some(end);
            }
            bindings.pop();
            set_choices.pop();
            None
        }
    }
}

fn push_zero_width(
    sequence: &[Element],
    seq_idx: usize,
    pattern: &[Token],
    pat_idx: usize,
    bindings: &mut Vec<Option<Element>>,
    set_choices: &mut Vec<Option<usize>>,
    opts: &MatchOptions,
) -> Option<usize> {
    bindings.push(None);
    set_choices.push(None);
    if let Some(end) = backtrack(sequence, seq_idx, pattern, pat_idx + 1, bindings, set_choices, opts)
    {
        return Some(end);
    }
    bindings.pop();
    set_choices.pop();
    None
}

/// Match a single element against a single-width token.
///
/// Returns the binding and, for sets, the matched alternative index.
/// Zero-width and quantified tokens never reach this function.
fn match_one(
    element: &Element,
    token: &Token,
    bindings: &[Option<Element>],
    seq_pos: usize,
    opts: &MatchOptions,
) -> Option<(Option<Element>, Option<usize>)> {
    match token {
        Token::Segment(sound) => {
            let target = element.as_sound()?;
            if segment_matches(sound, target, opts.system) {
                Some((Some(element.clone()), None))
            } else {
                None
            }
        }

        Token::Boundary(boundary) => match element {
            Element::Boundary(b) if b.marker == boundary.marker => {
                Some((Some(element.clone()), None))
            }
            _ => None,
        },

        Token::BackRef { index, mods } => {
            let source = if opts.prior.is_empty() { bindings } else { opts.prior };
            let bound = source.get(*index)?.as_ref()?;
            let matches = match (bound, mods) {
                (Element::Boundary(bound), _) => match element {
                    Element::Boundary(b) => b.marker == bound.marker,
                    Element::Sound(_) => false,
                },
                (Element::Sound(bound), None) => element
                    .as_sound()
                    .is_some_and(|target| sounds_equal(bound, target)),
                (Element::Sound(bound), Some(mods)) => {
                    let expected = system::apply_modifiers(&bound.features, mods, opts.system);
                    element.as_sound().is_some_and(|target| target.features == expected)
                }
            };
            if matches {
                Some((Some(element.clone()), None))
            } else {
                None
            }
        }

        Token::Choice(choices) => {
            for choice in choices {
                if match_one(element, choice, bindings, seq_pos, opts).is_some() {
                    return Some((Some(element.clone()), None));
                }
            }
            None
        }

        Token::Set(choices) => {
            for (index, choice) in choices.iter().enumerate() {
                if match_one(element, choice, bindings, seq_pos, opts).is_some() {
                    return Some((Some(element.clone()), Some(index)));
                }
            }
            None
        }

        Token::Negation(inner) => {
            // Single-element semantics: consume one element, succeed when
            // the inner token does not match it.
            if match_one(element, inner, bindings, seq_pos, opts).is_none() {
                Some((None, None))
            } else {
                None
            }
        }

        // Zero-width and quantified tokens are dispatched in `backtrack`.
        Token::Focus | Token::Empty | Token::SyllableCond(_) | Token::Quantified { .. } => None,
    }
}

/// Segment-token match: subsumption for class partials, grapheme or
/// feature-set equality for concrete sounds.
fn segment_matches(pattern: &Sound, target: &Sound, system: &dyn FeatureSystem) -> bool {
    if pattern.partial {
        if pattern.features.is_empty() {
            return false;
        }
        return system.partial_match(&pattern.features, &target.features);
    }
    sounds_equal(pattern, target)
}

fn sounds_equal(a: &Sound, b: &Sound) -> bool {
    a.grapheme == b.grapheme || (!a.features.is_empty() && a.features == b.features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_rule, parse_sequence};
    use crate::syllable::{syllable_map, SyllableConstraints};
    use crate::system::get_system;
    use std::sync::Arc;

    fn fixture(rule: &str, seq: &str) -> (crate::types::Rule, Vec<Element>, Arc<dyn FeatureSystem>) {
        let system = get_system(None).unwrap();
        let rule = parse_rule(rule, system.as_ref()).unwrap();
        let sequence = parse_sequence(seq, system.as_ref());
        (rule, sequence, system)
    }

    #[test]
    fn test_concrete_segment_match() {
        let (rule, seq, system) = fixture("p > b", "# a p a #");
        let opts = MatchOptions::new(system.as_ref(), 2);
        let result = match_pattern(&seq, &rule.ante, &opts);
        assert!(result.matched);
        assert_eq!(result.span, 1);
        assert_eq!(result.bindings.len(), 1);
        assert!(result.bindings[0].is_some());

        let opts = MatchOptions::new(system.as_ref(), 1);
        assert!(!match_pattern(&seq, &rule.ante, &opts).matched);
    }

    #[test]
    fn test_class_partial_match() {
        let (rule, seq, system) = fixture("V > a", "# e p #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        assert!(match_pattern(&seq, &rule.ante, &opts).matched);
        let opts = MatchOptions::new(system.as_ref(), 2);
        assert!(!match_pattern(&seq, &rule.ante, &opts).matched);
    }

    #[test]
    fn test_unknown_grapheme_never_matches_class() {
        let (rule, seq, system) = fixture("C > t", "# ß #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        assert!(!match_pattern(&seq, &rule.ante, &opts).matched);
    }

    #[test]
    fn test_boundary_match() {
        let (rule, seq, system) = fixture("# > #", "# a #");
        let opts = MatchOptions::new(system.as_ref(), 0);
        assert!(match_pattern(&seq, &rule.ante, &opts).matched);
        let opts = MatchOptions::new(system.as_ref(), 1);
        assert!(!match_pattern(&seq, &rule.ante, &opts).matched);
    }

    #[test]
    fn test_choice_match() {
        let (rule, seq, system) = fixture("p|b > f", "# b a #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        let result = match_pattern(&seq, &rule.ante, &opts);
        assert!(result.matched);
        assert_eq!(result.set_choices[0], None);
    }

    #[test]
    fn test_set_records_alternative_index() {
        let (rule, seq, system) = fixture("{p|b} > {f|v}", "# b a #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        let result = match_pattern(&seq, &rule.ante, &opts);
        assert!(result.matched);
        assert_eq!(result.set_choices[0], Some(1));
    }

    #[test]
    fn test_negation_is_single_element() {
        let (rule, seq, system) = fixture("!p > x", "# t a #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        let result = match_pattern(&seq, &rule.ante, &opts);
        assert!(result.matched);
        assert_eq!(result.span, 1);
        assert_eq!(result.bindings[0], None);

        let (rule, seq, system) = fixture("!t > x", "# t a #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        assert!(!match_pattern(&seq, &rule.ante, &opts).matched);
    }

    #[test]
    fn test_negated_choice() {
        let (rule, seq, system) = fixture("!p|b > x", "# t #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        assert!(match_pattern(&seq, &rule.ante, &opts).matched);

        let (rule, seq, system) = fixture("!p|b > x", "# b #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        assert!(!match_pattern(&seq, &rule.ante, &opts).matched);
    }

    #[test]
    fn test_plus_quantifier_greedy_with_backtracking() {
        let (rule, seq, system) = fixture("C+ t > x", "# a s p t a #");
        // C+ would swallow `s p t` greedily, then backtracks to `s p` so
        // the trailing `t` token can match.
        let opts = MatchOptions::new(system.as_ref(), 2);
        let result = match_pattern(&seq, &rule.ante, &opts);
        assert!(result.matched);
        assert_eq!(result.span, 3);
        // The quantifier binds its first consumed element.
        let first = result.bindings[0].as_ref().unwrap().as_sound().unwrap();
        assert_eq!(first.grapheme, "s");
    }

    #[test]
    fn test_plus_quantifier_needs_one() {
        let (rule, seq, system) = fixture("C+ > x", "# a #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        assert!(!match_pattern(&seq, &rule.ante, &opts).matched);
    }

    #[test]
    fn test_optional_quantifier_zero_first() {
        let (rule, seq, system) = fixture("V? t > x", "# t a #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        let result = match_pattern(&seq, &rule.ante, &opts);
        assert!(result.matched);
        assert_eq!(result.span, 1);
        assert_eq!(result.bindings[0], None);

        let (rule, seq, system) = fixture("V? t > x", "# a t #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        let result = match_pattern(&seq, &rule.ante, &opts);
        assert!(result.matched);
        assert_eq!(result.span, 2);
        assert!(result.bindings[0].is_some());
    }

    #[test]
    fn test_backref_in_ante() {
        // Gemination: a consonant followed by itself.
        let (rule, seq, system) = fixture("C @1 > @1", "# a t t a #");
        let opts = MatchOptions::new(system.as_ref(), 2);
        assert!(match_pattern(&seq, &rule.ante, &opts).matched);
        let opts = MatchOptions::new(system.as_ref(), 3);
        assert!(!match_pattern(&seq, &rule.ante, &opts).matched);
    }

    #[test]
    fn test_backref_against_prior_bindings() {
        let system = get_system(None).unwrap();
        let rule = parse_rule("p > b / @1 _", system.as_ref()).unwrap();
        let seq = parse_sequence("# p p a #", system.as_ref());
        let (left, _right) = rule.context_split().unwrap();

        // Prior bindings hold the matched ante element (a `p`).
        let prior = vec![Some(seq[2].clone())];
        let opts = MatchOptions {
            system: system.as_ref(),
            syllable_map: None,
            offset: 1,
            prior: &prior,
            require_end: None,
        };
        assert!(match_pattern(&seq, left, &opts).matched);
    }

    #[test]
    fn test_syllable_condition_gates_position() {
        let system = get_system(None).unwrap();
        let rule = parse_rule("C > @1[+voiced] / _.onset", system.as_ref()).unwrap();
        let seq = parse_sequence("# a p t a #", system.as_ref());
        let map = syllable_map(&seq, system.as_ref(), &SyllableConstraints::default());
        let (_, right) = rule.context_split().unwrap();

        // Position 3 (`t`) is an onset, position 2 (`p`) a coda.
        let opts = MatchOptions {
            system: system.as_ref(),
            syllable_map: Some(&map),
            offset: 3,
            prior: &[],
            require_end: None,
        };
        assert!(match_pattern(&seq, right, &opts).matched);

        let opts = MatchOptions {
            system: system.as_ref(),
            syllable_map: Some(&map),
            offset: 2,
            prior: &[],
            require_end: None,
        };
        assert!(!match_pattern(&seq, right, &opts).matched);

        // Without a syllable map the condition fails.
        let opts = MatchOptions {
            system: system.as_ref(),
            syllable_map: None,
            offset: 3,
            prior: &[],
            require_end: None,
        };
        assert!(!match_pattern(&seq, right, &opts).matched);
    }

    #[test]
    fn test_pattern_width() {
        let system = get_system(None).unwrap();
        let rule = parse_rule("V? C+ t > x", system.as_ref()).unwrap();
        let (min, max) = pattern_width(&rule.ante);
        assert_eq!(min, 2);
        assert_eq!(max, usize::MAX);
    }

    #[test]
    fn test_match_failure_is_empty() {
        let (rule, seq, system) = fixture("p > b", "# a #");
        let opts = MatchOptions::new(system.as_ref(), 1);
        let result = match_pattern(&seq, &rule.ante, &opts);
        assert!(!result.matched);
        assert!(result.bindings.is_empty());
        assert_eq!(result.span, 0);
    }
}
