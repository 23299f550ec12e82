//! Ordered rule sets and the sound-change engine.
//!
//! A rule set is an ordered list of changes applied sequentially; a rule
//! may be categorical (always applies) or gradient (applies per site with
//! a strength and seed). The engine can also record the full trajectory
//! of a word through a rule set, one step per rule.

use crate::applier::{apply_gradient, forward};
use crate::parser::{parse_rule, ParseError};
use crate::system::{get_system, FeatureSystem, RegistryError};
use crate::types::{render_sequence, Rule, Sequence};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while assembling or running a rule set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A rule failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The requested feature system does not exist.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// One entry of a rule set.
#[derive(Debug, Clone)]
pub enum ChangeRule {
    /// A rule that applies at every matching site.
    Categorical {
        /// Optional display name.
        name: Option<String>,
        /// The parsed rule.
        rule: Rule,
    },
    /// A rule that applies per site with a probability.
    Gradient {
        /// Optional display name.
        name: Option<String>,
        /// The rule source text (re-parsed at application time).
        source: String,
        /// Application strength, clamped to `[0, 1]`.
        strength: f64,
        /// RNG seed for reproducible runs.
        seed: Option<u64>,
    },
}

impl ChangeRule {
    /// The display name: explicit name or the rule source.
    pub fn label(&self) -> &str {
        match self {
            ChangeRule::Categorical { name, rule } => {
                name.as_deref().unwrap_or(rule.source.as_str())
            }
            ChangeRule::Gradient { name, source, .. } => name.as_deref().unwrap_or(source.as_str()),
        }
    }
}

/// An ordered list of sound changes.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ChangeRule>,
}

impl RuleSet {
    /// An empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and append a categorical rule.
    pub fn push_rule(
        &mut self,
        source: &str,
        system: &dyn FeatureSystem,
    ) -> Result<(), EngineError> {
        let rule = parse_rule(source, system)?;
        self.rules.push(ChangeRule::Categorical { name: None, rule });
        Ok(())
    }

    /// Parse and append a gradient rule.
    pub fn push_gradient(
        &mut self,
        source: &str,
        strength: f64,
        seed: Option<u64>,
        system: &dyn FeatureSystem,
    ) -> Result<(), EngineError> {
        // Parse eagerly so malformed rules surface here, not mid-run.
        parse_rule(source, system)?;
        self.rules.push(ChangeRule::Gradient {
            name: None,
            source: source.to_owned(),
            strength,
            seed,
        });
        Ok(())
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over the rules in application order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeRule> {
        self.rules.iter()
    }
}

/// Result of a single rule application step.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
pub struct StepResult {
    /// Rule label.
    pub rule_name: String,
    /// Rendered input sequence.
    pub input: String,
    /// Rendered output sequence.
    pub output: String,
    /// Whether the step changed the sequence.
    pub changed: bool,
}

/// Full trajectory of a sequence through a rule set.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    /// The starting sequence.
    pub input: Sequence,
    /// One record per applied rule.
    pub steps: Vec<StepResult>,
    /// The final sequence.
    pub output: Sequence,
}

impl Trajectory {
    /// Whether any step changed the sequence.
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|s| s.changed)
    }
}

/// Engine applying ordered rule sets to sequences.
pub struct SoundChangeEngine {
    system: Arc<dyn FeatureSystem>,
}

impl SoundChangeEngine {
    /// Engine over a named feature system (`None` for the default).
    pub fn new(system_name: Option<&str>) -> Result<Self, EngineError> {
        Ok(Self {
            system: get_system(system_name)?,
        })
    }

    /// Engine over an explicit feature system.
    pub fn with_system(system: Arc<dyn FeatureSystem>) -> Self {
        Self { system }
    }

    /// The engine's feature system.
    pub fn system(&self) -> &dyn FeatureSystem {
        self.system.as_ref()
    }

    /// Apply a single rule.
    pub fn apply_rule(
        &self,
        sequence: &Sequence,
        rule: &ChangeRule,
    ) -> Result<Sequence, EngineError> {
        match rule {
            ChangeRule::Categorical { rule, .. } => {
                Ok(forward(sequence, rule, self.system.as_ref()))
            }
            ChangeRule::Gradient {
                source,
                strength,
                seed,
                ..
            } => Ok(apply_gradient(
                sequence,
                source,
                *strength,
                *seed,
                self.system.as_ref(),
            )?),
        }
    }

    /// Apply every rule of a set in order.
    pub fn apply_ruleset(
        &self,
        sequence: &Sequence,
        ruleset: &RuleSet,
    ) -> Result<Sequence, EngineError> {
        let mut current = sequence.clone();
        for rule in ruleset.iter() {
            current = self.apply_rule(&current, rule)?;
        }
        Ok(current)
    }

    /// Apply a rule set, recording every intermediate form.
    pub fn apply_with_trajectory(
        &self,
        sequence: &Sequence,
        ruleset: &RuleSet,
    ) -> Result<Trajectory, EngineError> {
        let mut trajectory = Trajectory {
            input: sequence.clone(),
            ..Trajectory::default()
        };
        let mut current = sequence.clone();
        for rule in ruleset.iter() {
            let input = render_sequence(&current);
            let next = self.apply_rule(&current, rule)?;
            let output = render_sequence(&next);
            trajectory.steps.push(StepResult {
                rule_name: rule.label().to_owned(),
                changed: input != output,
                input,
                output,
            });
            current = next;
        }
        trajectory.output = current;
        Ok(trajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sequence;

    fn engine() -> SoundChangeEngine {
        SoundChangeEngine::new(None).unwrap()
    }

    #[test]
    fn test_ruleset_applies_in_order() {
        let engine = engine();
        let mut rules = RuleSet::new();
        // Feeding order: voicing creates the input for spirantization.
        rules.push_rule("p > b / V _ V", engine.system()).unwrap();
        rules.push_rule("b > β / V _ V", engine.system()).unwrap();

        let word = parse_sequence("# a p a #", engine.system());
        let result = engine.apply_ruleset(&word, &rules).unwrap();
        assert_eq!(render_sequence(&result), "# a β a #");
    }

    #[test]
    fn test_trajectory_records_steps() {
        let engine = engine();
        let mut rules = RuleSet::new();
        rules.push_rule("p > b / V _ V", engine.system()).unwrap();
        rules.push_rule("t > d / V _ V", engine.system()).unwrap();

        let word = parse_sequence("# a p a #", engine.system());
        let trajectory = engine.apply_with_trajectory(&word, &rules).unwrap();
        assert_eq!(trajectory.steps.len(), 2);
        assert!(trajectory.steps[0].changed);
        assert!(!trajectory.steps[1].changed);
        assert!(trajectory.changed());
        assert_eq!(render_sequence(&trajectory.output), "# a b a #");
    }

    #[test]
    fn test_gradient_extremes_in_ruleset() {
        let engine = engine();
        let mut all = RuleSet::new();
        all.push_gradient("p > b", 1.0, Some(7), engine.system()).unwrap();
        let mut none = RuleSet::new();
        none.push_gradient("p > b", 0.0, Some(7), engine.system()).unwrap();

        let word = parse_sequence("# p a p #", engine.system());
        let full = engine.apply_ruleset(&word, &all).unwrap();
        assert_eq!(render_sequence(&full), "# b a b #");
        let kept = engine.apply_ruleset(&word, &none).unwrap();
        assert_eq!(kept, word);
    }

    #[test]
    fn test_malformed_rule_surfaces_at_push() {
        let engine = engine();
        let mut rules = RuleSet::new();
        assert!(rules.push_rule("p b", engine.system()).is_err());
        assert!(rules
            .push_gradient("p >", 0.5, None, engine.system())
            .is_err());
        assert!(rules.is_empty());
    }
}
