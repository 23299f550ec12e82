//! Rule application: forward rewriting, backward reconstruction, and
//! gradient (probabilistic) application.
//!
//! Forward scans the sequence left to right in a single pass, rewriting
//! non-overlapping ante matches whose context holds. Backward inverts one
//! application: every site where the (modifier-carried) post pattern
//! matches may independently be a rewritten occurrence or original
//! material, so candidates are enumerated over all combinations, verified
//! against the context, and deduplicated — the input itself is always a
//! candidate. Gradient application is forward with a seeded per-site coin
//! flip.
//!
//! Neither operation fails on parse-valid input: modifier labels unknown
//! to the geometry pass through opaquely and unmatched rules return the
//! input unchanged.

use crate::matcher::{match_pattern, pattern_width, MatchOptions};
use crate::parser::{parse_rule, ParseError};
use crate::syllable::{syllable_map, SyllableConstraints, SyllableMap};
use crate::system::{self, FeatureSystem};
use crate::types::{Element, MatchResult, ModifierList, Rule, Sequence, Sound, Token};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound on combinable backward sites, to keep candidate
/// enumeration bounded on adversarial inputs.
const MAX_BACKWARD_SITES: usize = 16;

/// Default seed for gradient application when none is supplied.
const DEFAULT_GRADIENT_SEED: u64 = 0x5eed_cafe;

// ============================================================================
// Forward
// ============================================================================

/// Apply a rule once, left to right, without overlapping matches.
///
/// Deterministic and single-pass: the rule never rescans its own output.
pub fn forward(sequence: &[Element], rule: &Rule, system: &dyn FeatureSystem) -> Sequence {
    let map = forward_syllable_map(sequence, rule, system);
    let mut output: Sequence = Vec::with_capacity(sequence.len());
    let mut index = 0;
    while index < sequence.len() {
        match site_match(sequence, rule, index, map.as_ref(), system) {
            Some(result) if result.span > 0 => {
                output.extend(build_replacement(rule, &result, system));
                index += result.span;
            }
            _ => {
                output.push(sequence[index].clone());
                index += 1;
            }
        }
    }
    output
}

fn forward_syllable_map(
    sequence: &[Element],
    rule: &Rule,
    system: &dyn FeatureSystem,
) -> Option<SyllableMap> {
    rule.uses_syllable_conditions()
        .then(|| syllable_map(sequence, system, &SyllableConstraints::default()))
}

/// Match the ante at `index` and verify the context around it.
fn site_match(
    sequence: &[Element],
    rule: &Rule,
    index: usize,
    map: Option<&SyllableMap>,
    system: &dyn FeatureSystem,
) -> Option<MatchResult> {
    let opts = MatchOptions {
        system,
        syllable_map: map,
        offset: index,
        prior: &[],
        require_end: None,
    };
    let result = match_pattern(sequence, &rule.ante, &opts);
    if !result.matched {
        return None;
    }
    if let Some((left, right)) = rule.context_split() {
        if !context_holds(
            sequence,
            left,
            right,
            index,
            result.span,
            &result.bindings,
            map,
            system,
        ) {
            return None;
        }
    }
    Some(result)
}

/// Verify left and right context around a match at `position` with the
/// given span. The left pattern must end exactly at `position`; the right
/// pattern matches from `position + span`. Back-references inside the
/// context resolve against the ante bindings.
#[allow(clippy::too_many_arguments)]
fn context_holds(
    sequence: &[Element],
    left: &[Token],
    right: &[Token],
    position: usize,
    span: usize,
    ante_bindings: &[Option<Element>],
    map: Option<&SyllableMap>,
    system: &dyn FeatureSystem,
) -> bool {
    let right_opts = MatchOptions {
        system,
        syllable_map: map,
        offset: position + span,
        prior: ante_bindings,
        require_end: None,
    };
    if !match_pattern(sequence, right, &right_opts).matched {
        return false;
    }

    // The left pattern must end exactly at the match site; try window
    // widths from widest to narrowest.
    let (min_width, max_width) = pattern_width(left);
    let max_width = max_width.min(position);
    let mut width = max_width;
    loop {
        if width < min_width {
            return false;
        }
        let left_opts = MatchOptions {
            system,
            syllable_map: map,
            offset: position - width,
            prior: ante_bindings,
            require_end: Some(position),
        };
        if match_pattern(sequence, left, &left_opts).matched {
            return true;
        }
        if width == 0 {
            return false;
        }
        width -= 1;
    }
}

/// Build the replacement for a successful ante match from the post
/// pattern.
fn build_replacement(rule: &Rule, result: &MatchResult, system: &dyn FeatureSystem) -> Sequence {
    let ante_set_positions: Vec<usize> = set_positions(&rule.ante);
    let mut output = Vec::new();
    let mut post_set_counter = 0usize;

    for token in &rule.post {
        match token {
            Token::Segment(sound) => output.push(Element::Sound(sound.clone())),
            Token::Boundary(boundary) => output.push(Element::Boundary(boundary.clone())),
            Token::Empty => {}
            Token::BackRef { index, mods } => {
                let bound = result.bindings.get(*index).and_then(|b| b.as_ref());
                if let Some(element) = bound {
                    output.push(emit_backref(element, mods.as_ref(), system));
                }
            }
            Token::Set(choices) => {
                let alternative = ante_set_positions
                    .get(post_set_counter)
                    .and_then(|&pattern_pos| result.set_choices.get(pattern_pos))
                    .and_then(|choice| *choice)
                    .unwrap_or(0);
                post_set_counter += 1;
                if let Some(chosen) = choices.get(alternative).or_else(|| choices.first()) {
                    if let Some(element) = token_element(chosen) {
                        output.push(element);
                    }
                }
            }
            // A choice in post is rejected at parse time; emit the first
            // alternative if one ever survives.
            Token::Choice(choices) => {
                if let Some(element) = choices.first().and_then(token_element) {
                    output.push(element);
                }
            }
            Token::Focus | Token::SyllableCond(_) | Token::Quantified { .. } | Token::Negation(_) => {}
        }
    }
    output
}

/// Emit a back-referenced element, applying modifiers when present.
fn emit_backref(
    element: &Element,
    mods: Option<&ModifierList>,
    system: &dyn FeatureSystem,
) -> Element {
    match (element, mods) {
        (Element::Sound(sound), Some(mods)) => {
            let features = system::apply_modifiers(&sound.features, mods, system);
            let grapheme = system
                .features_to_grapheme(&features)
                .unwrap_or_else(|| sound.grapheme.clone());
            Element::Sound(Sound::new(grapheme, features))
        }
        _ => element.clone(),
    }
}

/// The element a primitive alternative token stands for.
fn token_element(token: &Token) -> Option<Element> {
    match token {
        Token::Segment(sound) => Some(Element::Sound(sound.clone())),
        Token::Boundary(boundary) => Some(Element::Boundary(boundary.clone())),
        _ => None,
    }
}

fn set_positions(pattern: &[Token]) -> Vec<usize> {
    pattern
        .iter()
        .enumerate()
        .filter_map(|(i, t)| matches!(t, Token::Set(_)).then_some(i))
        .collect()
}

// ============================================================================
// Backward
// ============================================================================

/// A post-pattern match site in the observed sequence.
struct Site {
    position: usize,
    result: MatchResult,
}

/// Reconstruction of one site: the proto elements, plus per-ante-position
/// bindings used for context verification.
struct Reconstruction {
    elements: Sequence,
    ante_bindings: Vec<Option<Element>>,
}

/// Enumerate the sequences that could have produced `sequence` under one
/// application of `rule`.
///
/// Every site where the post pattern matches may independently have been
/// rewritten or original, so all combinations are emitted; candidates
/// whose reconstructed context does not hold are discarded, duplicates
/// are removed, and the input itself is always included.
pub fn backward(sequence: &[Element], rule: &Rule, system: &dyn FeatureSystem) -> Vec<Sequence> {
    let (post_pattern, origins) = build_post_pattern(rule, system);
    let (min_width, _) = pattern_width(&post_pattern);
    if post_pattern.is_empty() || min_width == 0 {
        // Pure deletions are not invertible site by site.
        return vec![sequence.to_vec()];
    }

    // Non-overlapping post-pattern sites, left to right.
    let mut sites: Vec<Site> = Vec::new();
    let mut index = 0;
    while index < sequence.len() {
        let opts = MatchOptions::new(system, index);
        let result = match_pattern(sequence, &post_pattern, &opts);
        if result.matched && result.span > 0 {
            let span = result.span;
            sites.push(Site {
                position: index,
                result,
            });
            index += span;
        } else {
            index += 1;
        }
    }
    sites.truncate(MAX_BACKWARD_SITES);

    let reconstructions: Vec<Reconstruction> = sites
        .iter()
        .map(|site| reconstruct_site(rule, &post_pattern, &origins, site, system))
        .collect();

    let mut candidates: Vec<Sequence> = Vec::new();
    let combinations = 1usize << sites.len();
    for mask in 0..combinations {
        let mut candidate: Sequence = Vec::with_capacity(sequence.len());
        // (position in candidate, reconstructed length, ante bindings)
        let mut injected: Vec<(usize, usize, &Vec<Option<Element>>)> = Vec::new();
        let mut cursor = 0usize;
        for (bit, site) in sites.iter().enumerate() {
            candidate.extend_from_slice(&sequence[cursor..site.position]);
            if mask & (1 << bit) != 0 {
                let reconstruction = &reconstructions[bit];
                injected.push((
                    candidate.len(),
                    reconstruction.elements.len(),
                    &reconstruction.ante_bindings,
                ));
                candidate.extend(reconstruction.elements.iter().cloned());
            } else {
                candidate
                    .extend_from_slice(&sequence[site.position..site.position + site.result.span]);
            }
            cursor = site.position + site.result.span;
        }
        candidate.extend_from_slice(&sequence[cursor..]);

        if rule.context.is_some() && !injected.is_empty() {
            // Re-syllabify only when the rule conditions on syllables.
            let map = forward_syllable_map(&candidate, rule, system);
            let (left, right) = match rule.context_split() {
                Some(split) => split,
                None => (&[][..], &[][..]),
            };
            let all_hold = injected.iter().all(|(position, length, bindings)| {
                context_holds(
                    &candidate,
                    left,
                    right,
                    *position,
                    *length,
                    bindings,
                    map.as_ref(),
                    system,
                )
            });
            if !all_hold {
                continue;
            }
        }

        // Soundness: a reconstruction is a valid proto-form only if one
        // forward application re-derives the observed sequence. The
        // unchanged sequence is always kept (the rule may simply not have
        // applied).
        if candidate != sequence
            && forward(&candidate, rule, system) != sequence
        {
            continue;
        }

        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }

    if candidates.is_empty() {
        candidates.push(sequence.to_vec());
    }
    candidates
}

/// Where a post-pattern token came from, for inversion.
#[derive(Clone, Default)]
struct PostOrigin {
    /// The ante position a back-reference pointed at.
    ante_index: Option<usize>,
    /// The back-reference's modifiers, to be inverted on reconstruction.
    mods: Option<ModifierList>,
}

/// Build the pattern that matches what forward application would have
/// produced: post tokens with `:null:` dropped and back-references
/// replaced by their ante token carrying the modifier.
fn build_post_pattern(rule: &Rule, system: &dyn FeatureSystem) -> (Vec<Token>, Vec<PostOrigin>) {
    let mut pattern = Vec::new();
    let mut origins = Vec::new();
    for token in &rule.post {
        match token {
            Token::Empty => {}
            Token::BackRef { index, mods } => {
                let carried = match rule.ante.get(*index) {
                    Some(Token::Segment(sound)) => {
                        let sound = match mods {
                            Some(mods) => {
                                let features =
                                    system::apply_modifiers(&sound.features, mods, system);
                                let grapheme = if sound.partial {
                                    sound.grapheme.clone()
                                } else {
                                    system
                                        .features_to_grapheme(&features)
                                        .unwrap_or_else(|| sound.grapheme.clone())
                                };
                                Sound {
                                    grapheme,
                                    features,
                                    partial: sound.partial,
                                }
                            }
                            None => sound.clone(),
                        };
                        Token::Segment(sound)
                    }
                    // Sets, choices, quantifieds: carried unmodified.
                    Some(other) => other.clone(),
                    None => token.clone(),
                };
                pattern.push(carried);
                origins.push(PostOrigin {
                    ante_index: Some(*index),
                    mods: mods.clone(),
                });
            }
            other => {
                pattern.push(other.clone());
                origins.push(PostOrigin::default());
            }
        }
    }
    (pattern, origins)
}

/// Rebuild the ante-side elements for one matched site.
fn reconstruct_site(
    rule: &Rule,
    post_pattern: &[Token],
    origins: &[PostOrigin],
    site: &Site,
    system: &dyn FeatureSystem,
) -> Reconstruction {
    // Invert the bindings: ante position -> element observed in the post,
    // with the back-reference modifiers flipped.
    let mut inverted: Vec<Option<Element>> = vec![None; rule.ante.len()];
    for (pattern_pos, origin) in origins.iter().enumerate() {
        let Some(ante_index) = origin.ante_index else {
            continue;
        };
        let Some(Some(element)) = site.result.bindings.get(pattern_pos) else {
            continue;
        };
        let element = match &origin.mods {
            Some(mods) => emit_backref(element, Some(&mods.inverted()), system),
            None => element.clone(),
        };
        if let Some(slot) = inverted.get_mut(ante_index) {
            *slot = Some(element);
        }
    }

    // Pair ante sets with post-pattern sets by order, so a set position
    // reconstructs the ante alternative at the matched index.
    let ante_sets = set_positions(&rule.ante);
    let post_sets = set_positions(post_pattern);
    let mut set_choice_by_ante: Vec<Option<usize>> = vec![None; rule.ante.len()];
    for (k, &ante_pos) in ante_sets.iter().enumerate() {
        if let Some(&post_pos) = post_sets.get(k) {
            set_choice_by_ante[ante_pos] =
                site.result.set_choices.get(post_pos).and_then(|c| *c);
        }
    }

    let mut elements: Sequence = Vec::new();
    let mut ante_bindings: Vec<Option<Element>> = Vec::with_capacity(rule.ante.len());
    for (position, token) in rule.ante.iter().enumerate() {
        let emitted: Option<Element> = if let Some(element) = &inverted[position] {
            Some(element.clone())
        } else {
            match token {
                Token::Segment(sound) => Some(Element::Sound(sound.clone())),
                Token::Boundary(boundary) => Some(Element::Boundary(boundary.clone())),
                Token::Empty | Token::Focus | Token::SyllableCond(_) => None,
                Token::Set(choices) => {
                    let choice = set_choice_by_ante[position].unwrap_or(0);
                    choices.get(choice).or_else(|| choices.first()).and_then(token_element)
                }
                Token::Choice(choices) => choices.first().and_then(token_element),
                Token::Quantified { inner, .. } => token_element(inner),
                Token::BackRef { index, .. } => inverted
                    .get(*index)
                    .and_then(|slot| slot.clone()),
                Token::Negation(_) => None,
            }
        };
        ante_bindings.push(emitted.clone());
        if let Some(element) = emitted {
            elements.push(element);
        }
    }

    Reconstruction {
        elements,
        ante_bindings,
    }
}

// ============================================================================
// Gradient application
// ============================================================================

/// Clamp a strength value to `[0, 1]`.
fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Apply a rule with per-site probability `strength`.
///
/// `strength >= 1` degenerates to [`forward`] and `strength <= 0` to the
/// identity; in between, each match site is rewritten independently with
/// the given probability, driven by a deterministic seeded RNG.
pub fn apply_gradient(
    sequence: &[Element],
    rule_text: &str,
    strength: f64,
    seed: Option<u64>,
    system: &dyn FeatureSystem,
) -> Result<Sequence, ParseError> {
    let rule = parse_rule(rule_text, system)?;
    if strength >= 1.0 {
        return Ok(forward(sequence, &rule, system));
    }
    if strength <= 0.0 {
        return Ok(sequence.to_vec());
    }
    let strength = clamp01(strength);
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or(DEFAULT_GRADIENT_SEED));

    let map = forward_syllable_map(sequence, &rule, system);
    let mut output: Sequence = Vec::with_capacity(sequence.len());
    let mut index = 0;
    while index < sequence.len() {
        match site_match(sequence, &rule, index, map.as_ref(), system) {
            Some(result) if result.span > 0 => {
                if rng.gen::<f64>() < strength {
                    output.extend(build_replacement(&rule, &result, system));
                } else {
                    output.extend_from_slice(&sequence[index..index + result.span]);
                }
                index += result.span;
            }
            _ => {
                output.push(sequence[index].clone());
                index += 1;
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sequence;
    use crate::system::get_system;
    use crate::types::render_sequence;
    use std::sync::Arc;

    fn sys() -> Arc<dyn FeatureSystem> {
        get_system(None).unwrap()
    }

    fn run_forward(rule: &str, input: &str) -> String {
        let system = sys();
        let rule = parse_rule(rule, system.as_ref()).unwrap();
        let sequence = parse_sequence(input, system.as_ref());
        render_sequence(&forward(&sequence, &rule, system.as_ref()))
    }

    fn run_backward(rule: &str, input: &str) -> Vec<String> {
        let system = sys();
        let rule = parse_rule(rule, system.as_ref()).unwrap();
        let sequence = parse_sequence(input, system.as_ref());
        let mut results: Vec<String> = backward(&sequence, &rule, system.as_ref())
            .iter()
            .map(|c| render_sequence(c))
            .collect();
        results.sort();
        results
    }

    #[test]
    fn test_forward_simple_substitution() {
        assert_eq!(run_forward("p > b", "# a p a #"), "# a b a #");
    }

    #[test]
    fn test_forward_no_match_returns_input() {
        assert_eq!(run_forward("p > b", "# a t a #"), "# a t a #");
    }

    #[test]
    fn test_forward_intervocalic_voicing() {
        assert_eq!(run_forward("p > b / V _ V", "# a p a #"), "# a b a #");
        // Context fails word-initially.
        assert_eq!(run_forward("p > b / V _ V", "# p a #"), "# p a #");
    }

    #[test]
    fn test_forward_cluster_deletion() {
        assert_eq!(run_forward("C+ > :null: / _ #", "# a s t #"), "# a #");
    }

    #[test]
    fn test_forward_backref_modifier() {
        assert_eq!(run_forward("C > @1[+voiced] / V _ V", "# a t a #"), "# a d a #");
    }

    #[test]
    fn test_forward_correspondence_set() {
        assert_eq!(run_forward("{p|b} > {f|v}", "# p a b a #"), "# f a v a #");
    }

    #[test]
    fn test_forward_syllable_condition() {
        assert_eq!(
            run_forward("C > @1[+voiced] / _.onset", "# a p t a #"),
            "# a b t a #"
        );
    }

    #[test]
    fn test_forward_boundary_context() {
        assert_eq!(run_forward("t > d / # _", "# t a t a #"), "# d a t a #");
        assert_eq!(run_forward("t > d / _ #", "# a t #"), "# a d #");
    }

    #[test]
    fn test_forward_does_not_rescan_output() {
        // The emitted `t` must not feed the same rule within one pass.
        assert_eq!(run_forward("t > t t", "# a t a #"), "# a t t a #");
    }

    #[test]
    fn test_forward_deletion_and_insertion_in_post() {
        assert_eq!(run_forward("p > :null:", "# a p a #"), "# a a #");
        assert_eq!(run_forward("p > p s", "# a p a #"), "# a p s a #");
    }

    #[test]
    fn test_backward_includes_input() {
        let candidates = run_backward("p > b / V _ V", "# a t a #");
        assert_eq!(candidates, vec!["# a t a #".to_owned()]);
    }

    #[test]
    fn test_backward_intervocalic_voicing() {
        let candidates = run_backward("p > b / V _ V", "# a b a #");
        assert_eq!(
            candidates,
            vec!["# a b a #".to_owned(), "# a p a #".to_owned()]
        );
    }

    #[test]
    fn test_backward_multiple_sites_product() {
        let candidates = run_backward("p > b", "# b a b #");
        assert_eq!(candidates.len(), 4);
        assert!(candidates.contains(&"# b a b #".to_owned()));
        assert!(candidates.contains(&"# p a b #".to_owned()));
        assert!(candidates.contains(&"# b a p #".to_owned()));
        assert!(candidates.contains(&"# p a p #".to_owned()));
    }

    #[test]
    fn test_backward_backref_modifier_inverts() {
        // Inverting `[+voiced]` strips the label; every candidate must
        // re-derive the observed form under forward application.
        let system = sys();
        let rule = parse_rule("C > @1[+voiced] / V _ V", system.as_ref()).unwrap();
        let observed = parse_sequence("# a d a #", system.as_ref());
        let candidates = backward(&observed, &rule, system.as_ref());
        assert!(candidates.contains(&observed));
        for candidate in &candidates {
            assert_eq!(forward(candidate, &rule, system.as_ref()), observed);
        }
    }

    #[test]
    fn test_backward_correspondence_set() {
        let candidates = run_backward("{p|b} > {f|v}", "# f a #");
        assert!(candidates.contains(&"# f a #".to_owned()));
        assert!(candidates.contains(&"# p a #".to_owned()));
        assert!(!candidates.contains(&"# b a #".to_owned()));
    }

    #[test]
    fn test_backward_context_discards_bad_reconstructions() {
        // `b` next to a consonant cannot come from intervocalic voicing.
        let candidates = run_backward("p > b / V _ V", "# b r a #");
        assert_eq!(candidates, vec!["# b r a #".to_owned()]);
    }

    #[test]
    fn test_backward_soundness() {
        // Every reconstructed candidate forward-derives the observed form.
        let system = sys();
        let rule = parse_rule("p > b / V _ V", system.as_ref()).unwrap();
        let observed = parse_sequence("# a b a b a #", system.as_ref());
        for candidate in backward(&observed, &rule, system.as_ref()) {
            assert_eq!(
                forward(&candidate, &rule, system.as_ref()),
                observed,
                "candidate {} does not re-derive the observed form",
                render_sequence(&candidate)
            );
        }
    }

    #[test]
    fn test_backward_pure_deletion_not_enumerated() {
        let candidates = run_backward("C > :null: / _ #", "# a #");
        assert_eq!(candidates, vec!["# a #".to_owned()]);
    }

    #[test]
    fn test_gradient_degenerate_cases() {
        let system = sys();
        let sequence = parse_sequence("# a p a p a #", system.as_ref());
        let rule = parse_rule("p > b", system.as_ref()).unwrap();

        let full = apply_gradient(&sequence, "p > b", 1.0, None, system.as_ref()).unwrap();
        assert_eq!(full, forward(&sequence, &rule, system.as_ref()));

        let none = apply_gradient(&sequence, "p > b", 0.0, None, system.as_ref()).unwrap();
        assert_eq!(none, sequence);
    }

    #[test]
    fn test_gradient_is_deterministic_per_seed() {
        let system = sys();
        let sequence = parse_sequence("# p a p a p a p a #", system.as_ref());
        let first = apply_gradient(&sequence, "p > b", 0.5, Some(42), system.as_ref()).unwrap();
        let second = apply_gradient(&sequence, "p > b", 0.5, Some(42), system.as_ref()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_gradient_sites_are_independent() {
        // With many sites and an even coin, some seed must produce a mix.
        let system = sys();
        let sequence = parse_sequence("# p a p a p a p a p a #", system.as_ref());
        let mut saw_mixed = false;
        for seed in 0..32 {
            let result =
                apply_gradient(&sequence, "p > b", 0.5, Some(seed), system.as_ref()).unwrap();
            let text = render_sequence(&result);
            if text.contains('p') && text.contains('b') {
                saw_mixed = true;
                break;
            }
        }
        assert!(saw_mixed);
    }
}
