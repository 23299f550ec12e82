//! Sonority-based syllabification (Sonority Sequencing Principle).
//!
//! Nuclei are sonority peaks (vowels, or syllabic consonants); consonants
//! between two nuclei split so that the right syllable receives the
//! longest legal onset (sonority strictly rising toward the nucleus, with
//! an optional initial-sibilant escape hatch) and the remainder becomes
//! the left syllable's coda. The result is exposed both as syllable
//! values and as a flat position-to-role map used by the matcher.
//!
//! Syllabification is pure: no global state, same input gives same output.

use crate::intern::{FeatureSet, Label};
use crate::system::FeatureSystem;
use crate::types::{Element, Sound, SyllableRole};
use std::fmt;

/// A sonority scale keyed by feature labels.
///
/// Levels are consulted in order; the first label present in a sound's
/// features decides its sonority.
#[derive(Debug, Clone, PartialEq)]
pub struct SonorityScale {
    levels: Vec<(Label, u8)>,
}

impl SonorityScale {
    /// Build a scale from (label, level) pairs, consulted in order.
    pub fn new<I: IntoIterator<Item = (&'static str, u8)>>(levels: I) -> Self {
        Self {
            levels: levels
                .into_iter()
                .map(|(name, level)| (Label::intern(name), level))
                .collect(),
        }
    }

    /// Level of the first matching label, if any.
    fn level_of(&self, features: &FeatureSet) -> Option<u8> {
        self.levels
            .iter()
            .find(|(label, _)| features.contains(*label))
            .map(|(_, level)| *level)
    }
}

impl Default for SonorityScale {
    /// The default scale: vowels 5, approximants and laterals 4, trills
    /// and taps 3, nasals 2, fricatives 1, stops and the remaining
    /// obstruents 0.
    fn default() -> Self {
        Self::new([
            ("vowel", 5),
            ("approximant", 4),
            ("lateral", 4),
            ("trill", 3),
            ("tap", 3),
            ("nasal", 2),
            ("fricative", 1),
            ("affricate", 0),
            ("stop", 0),
            ("click", 0),
            ("implosive", 0),
        ])
    }
}

/// Constraints steering syllabification.
#[derive(Debug, Clone, PartialEq)]
pub struct SyllableConstraints {
    /// Permit `s`-initial onset clusters that violate the SSP (English
    /// `st`, `sp`).
    pub allow_s_cluster: bool,
    /// Maximum onset length; excess consonants join the previous coda.
    pub max_onset: usize,
    /// Maximum coda length.
    pub max_coda: usize,
    /// Sonority scale in use.
    pub scale: SonorityScale,
}

impl Default for SyllableConstraints {
    fn default() -> Self {
        Self {
            allow_s_cluster: false,
            max_onset: 3,
            max_coda: 3,
            scale: SonorityScale::default(),
        }
    }
}

/// One syllable: onset, nucleus, and coda spans.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Syllable {
    /// Consonants before the nucleus.
    pub onset: Vec<Sound>,
    /// The sonority peak.
    pub nucleus: Vec<Sound>,
    /// Consonants after the nucleus.
    pub coda: Vec<Sound>,
}

impl Syllable {
    /// Number of sounds in the syllable.
    pub fn len(&self) -> usize {
        self.onset.len() + self.nucleus.len() + self.coda.len()
    }

    /// Whether the syllable holds no sounds.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Syllable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sound in self.onset.iter().chain(&self.nucleus).chain(&self.coda) {
            f.write_str(&sound.grapheme)?;
        }
        Ok(())
    }
}

/// A syllabified word.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyllableWord {
    /// Syllables in order.
    pub syllables: Vec<Syllable>,
}

impl fmt::Display for SyllableWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.syllables.iter().map(|s| s.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

/// Position-to-role map over an element sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyllableMap {
    roles: Vec<SyllableRole>,
}

impl SyllableMap {
    /// Role at a sequence position, `None` past the end.
    pub fn role(&self, index: usize) -> Option<SyllableRole> {
        self.roles.get(index).copied()
    }

    /// Number of mapped positions.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Sonority level of a sound, resolving features through the system when
/// the sound itself carries none. Syllabic consonants peak like vowels.
pub fn sonority(sound: &Sound, system: &dyn FeatureSystem, scale: &SonorityScale) -> u8 {
    let resolved;
    let features = if sound.features.is_empty() {
        resolved = system.grapheme_to_features(&sound.grapheme).unwrap_or_default();
        &resolved
    } else {
        &sound.features
    };
    if let Some(level) = scale.level_of(features) {
        return level;
    }
    if features.contains(Label::intern("syllabic")) {
        return 5;
    }
    0
}

fn is_nucleus(sound: &Sound, system: &dyn FeatureSystem) -> bool {
    let resolved;
    let features = if sound.features.is_empty() {
        resolved = system.grapheme_to_features(&sound.grapheme).unwrap_or_default();
        &resolved
    } else {
        &sound.features
    };
    features.contains(Label::intern("vowel"))
        || (features.contains(Label::intern("syllabic"))
            && !features.contains(Label::intern("consonant")))
}

fn is_sibilant_fricative(sound: &Sound, system: &dyn FeatureSystem) -> bool {
    let resolved;
    let features = if sound.features.is_empty() {
        resolved = system.grapheme_to_features(&sound.grapheme).unwrap_or_default();
        &resolved
    } else {
        &sound.features
    };
    features.contains(Label::intern("fricative")) && features.contains(Label::intern("sibilant"))
}

/// Whether a consonant run is a legal onset: sonority strictly rises
/// toward the nucleus, within the length cap. Zero- and one-consonant
/// onsets are always legal; with `allow_s_cluster` an initial sibilant
/// fricative is exempt from the rise requirement.
fn is_legal_onset(
    consonants: &[Sound],
    system: &dyn FeatureSystem,
    constraints: &SyllableConstraints,
) -> bool {
    if consonants.len() <= 1 {
        return true;
    }
    if consonants.len() > constraints.max_onset {
        return false;
    }
    for i in 0..consonants.len() - 1 {
        let current = sonority(&consonants[i], system, &constraints.scale);
        let next = sonority(&consonants[i + 1], system, &constraints.scale);
        if next <= current {
            if constraints.allow_s_cluster && i == 0 && is_sibilant_fricative(&consonants[0], system)
            {
                continue;
            }
            return false;
        }
    }
    true
}

/// Syllabify a run of sounds.
///
/// 1. Nuclei are maximal vowel runs; a sonority rise inside a run starts a
///    new nucleus (hiatus), a fall or plateau keeps a diphthong together.
/// 2. Word-initial consonants are the first onset; word-final consonants
///    the last coda.
/// 3. Clusters between nuclei give the right syllable its longest legal
///    onset and leave the rest as the left coda, capped by `max_coda`.
/// 4. A word with no nucleus comes back as a single onset-only syllable.
pub fn syllabify(
    sounds: &[Sound],
    system: &dyn FeatureSystem,
    constraints: &SyllableConstraints,
) -> SyllableWord {
    if sounds.is_empty() {
        return SyllableWord::default();
    }

    // Locate nucleus spans (start, end inclusive).
    let mut nuclei: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < sounds.len() {
        if is_nucleus(&sounds[i], system) {
            let start = i;
            i += 1;
            while i < sounds.len() && is_nucleus(&sounds[i], system) {
                let previous = sonority(&sounds[i - 1], system, &constraints.scale);
                let current = sonority(&sounds[i], system, &constraints.scale);
                if current > previous {
                    break; // hiatus: rising sonority starts a new nucleus
                }
                i += 1;
            }
            nuclei.push((start, i - 1));
        } else {
            i += 1;
        }
    }

    if nuclei.is_empty() {
        return SyllableWord {
            syllables: vec![Syllable {
                onset: sounds.to_vec(),
                ..Syllable::default()
            }],
        };
    }

    let mut syllables: Vec<Syllable> = Vec::new();
    for (idx, &(nucleus_start, nucleus_end)) in nuclei.iter().enumerate() {
        let mut onset: Vec<Sound> = Vec::new();

        if idx == 0 {
            onset = sounds[..nucleus_start].to_vec();
        } else {
            let previous_end = nuclei[idx - 1].1;
            let between = &sounds[previous_end + 1..nucleus_start];
            if !between.is_empty() {
                // Longest legal onset for this syllable, scanning splits
                // left to right so the onset is maximal.
                let mut split = between.len();
                for candidate in 0..=between.len() {
                    if is_legal_onset(&between[candidate..], system, constraints) {
                        split = candidate;
                        break;
                    }
                }
                let mut coda = between[..split].to_vec();
                if coda.len() > constraints.max_coda {
                    // Keep the consonants closest to the nucleus.
                    let drop = coda.len() - constraints.max_coda;
                    coda.drain(..drop);
                }
                if let Some(previous) = syllables.last_mut() {
                    previous.coda.extend(coda);
                }
                onset = between[split..].to_vec();
            }
        }

        let mut coda: Vec<Sound> = Vec::new();
        if idx == nuclei.len() - 1 {
            coda = sounds[nucleus_end + 1..].to_vec();
        }

        syllables.push(Syllable {
            onset,
            nucleus: sounds[nucleus_start..=nucleus_end].to_vec(),
            coda,
        });
    }

    SyllableWord { syllables }
}

/// Build the position-to-role map for a full element sequence.
///
/// Boundaries map to [`SyllableRole::Boundary`]; the sounds between them
/// are syllabified and their roles written back at the original indices.
pub fn syllable_map(
    sequence: &[Element],
    system: &dyn FeatureSystem,
    constraints: &SyllableConstraints,
) -> SyllableMap {
    let mut roles = vec![SyllableRole::Boundary; sequence.len()];

    let sound_positions: Vec<usize> = sequence
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_boundary())
        .map(|(i, _)| i)
        .collect();
    let sounds: Vec<Sound> = sound_positions
        .iter()
        .filter_map(|&i| sequence[i].as_sound().cloned())
        .collect();

    let word = syllabify(&sounds, system, constraints);
    let mut cursor = 0usize;
    let mut assign = |roles: &mut Vec<SyllableRole>, count: usize, role: SyllableRole| {
        for _ in 0..count {
            if let Some(&position) = sound_positions.get(cursor) {
                roles[position] = role;
                cursor += 1;
            }
        }
    };
    for syllable in &word.syllables {
        assign(&mut roles, syllable.onset.len(), SyllableRole::Onset);
        assign(&mut roles, syllable.nucleus.len(), SyllableRole::Nucleus);
        assign(&mut roles, syllable.coda.len(), SyllableRole::Coda);
    }

    SyllableMap { roles }
}
