//! # soundlaw
//!
//! A phonological sound-change engine for historical linguistics.
//!
//! Sound-change rules in the classical `ANTE > POST / CONTEXT` notation
//! are parsed into immutable values, matched against segment sequences,
//! and applied *forward* (simulating language change) or *backward*
//! (enumerating the proto-forms that could have produced an observed
//! word):
//!
//! ```rust
//! use soundlaw::prelude::*;
//!
//! let system = get_system(None).unwrap();
//! let rule = parse_rule("p > b / V _ V", system.as_ref()).unwrap();
//! let word = parse_sequence("# a p a #", system.as_ref());
//!
//! let changed = forward(&word, &rule, system.as_ref());
//! assert_eq!(render_sequence(&changed), "# a b a #");
//!
//! let protos = backward(&changed, &rule, system.as_ref());
//! assert!(protos.contains(&word));
//! ```
//!
//! The phonological substrate is a pluggable [feature
//! system](crate::system::FeatureSystem) (grapheme to feature set and
//! back, feature arithmetic, sound distances) over a [feature geometry
//! tree](crate::geometry) in the style of Clements & Hume (1995), plus a
//! sonority-based [syllabifier](crate::syllable) so rules can condition
//! on onset/nucleus/coda position (`C > @1[+voiced] / _.onset`).
//!
//! Rule patterns support sound classes (`V`, `C`, `N`, ...), choices
//! (`p|b`), correspondence sets (`{p|b} > {f|v}`), back-references with
//! feature modifiers (`@1[+voiced]`), quantifiers (`C+`, `V?`), negation
//! (`!p`), and boundaries (`#`).
//!
//! All values are immutable once constructed and freely shareable across
//! threads; the only mutable state is the lazily-initialized feature
//! system registry.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod applier;
#[cfg(feature = "serialization")]
pub mod cli;
pub mod engine;
pub mod geometry;
pub mod intern;
pub mod matcher;
pub mod parser;
pub mod resources;
pub mod syllable;
pub mod system;
pub mod types;

/// Common imports for convenient usage.
pub mod prelude {
    pub use crate::applier::{apply_gradient, backward, forward};
    pub use crate::engine::{ChangeRule, RuleSet, SoundChangeEngine, Trajectory};
    pub use crate::intern::{FeatureSet, Label};
    pub use crate::matcher::{match_pattern, MatchOptions};
    pub use crate::parser::{parse_rule, parse_sequence, ParseError};
    pub use crate::resources::ResourceError;
    pub use crate::syllable::{syllabify, syllable_map, SyllableConstraints};
    pub use crate::system::{
        get_system, grapheme_distance, list_systems, register, set_default, FeatureSystem,
        RegistryError,
    };
    pub use crate::types::{
        render_sequence, Boundary, Element, MatchResult, Rule, Sequence, Sound, SyllableRole,
        Token,
    };
}
