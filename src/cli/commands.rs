//! CLI command handlers.

use crate::applier::{apply_gradient, backward, forward};
use crate::cli::args::{Cli, Commands};
use crate::parser::{parse_rule, parse_sequence};
use crate::syllable::{syllabify, SyllableConstraints};
use crate::system::{get_system, grapheme_distance, list_systems, FeatureSystem};
use crate::types::{render_sequence, Element, Sequence};
use anyhow::Result;

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let system = get_system(cli.system.as_deref())?;

    match cli.command {
        Commands::Apply {
            rule,
            words,
            strength,
            seed,
        } => apply(&rule, &words, strength, seed, cli.json, system.as_ref()),
        Commands::Reconstruct { rule, words } => {
            reconstruct(&rule, &words, cli.json, system.as_ref())
        }
        Commands::Parse { rule } => parse(&rule, cli.json, system.as_ref()),
        Commands::Syllabify { word, s_cluster } => {
            run_syllabify(&word, s_cluster, cli.json, system.as_ref())
        }
        Commands::Distance { a, b } => distance(&a, &b, cli.json, system.as_ref()),
        Commands::Systems => systems(cli.json),
    }
}

/// Parse a word, wrapping it in word boundaries when absent.
fn word_sequence(text: &str, system: &dyn FeatureSystem) -> Sequence {
    let mut sequence = parse_sequence(text, system);
    if !sequence.first().is_some_and(Element::is_boundary) {
        sequence.insert(0, Element::Boundary(Default::default()));
    }
    if !sequence.last().is_some_and(Element::is_boundary) {
        sequence.push(Element::Boundary(Default::default()));
    }
    sequence
}

fn apply(
    rule_text: &str,
    words: &[String],
    strength: Option<f64>,
    seed: Option<u64>,
    json: bool,
    system: &dyn FeatureSystem,
) -> Result<()> {
    let rule = parse_rule(rule_text, system)?;
    let mut results: Vec<(String, String)> = Vec::new();
    for word in words {
        let sequence = word_sequence(word, system);
        let output = match strength {
            Some(strength) => apply_gradient(&sequence, rule_text, strength, seed, system)?,
            None => forward(&sequence, &rule, system),
        };
        results.push((render_sequence(&sequence), render_sequence(&output)));
    }

    if json {
        let entries: Vec<serde_json::Value> = results
            .iter()
            .map(|(input, output)| {
                serde_json::json!({ "input": input, "output": output })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (input, output) in results {
            println!("{input} -> {output}");
        }
    }
    Ok(())
}

fn reconstruct(
    rule_text: &str,
    words: &[String],
    json: bool,
    system: &dyn FeatureSystem,
) -> Result<()> {
    let rule = parse_rule(rule_text, system)?;
    for word in words {
        let sequence = word_sequence(word, system);
        let candidates: Vec<String> = backward(&sequence, &rule, system)
            .iter()
            .map(|c| render_sequence(c))
            .collect();
        if json {
            let entry = serde_json::json!({
                "input": render_sequence(&sequence),
                "candidates": candidates,
            });
            println!("{}", serde_json::to_string_pretty(&entry)?);
        } else {
            println!("{}:", render_sequence(&sequence));
            for candidate in candidates {
                println!("  {candidate}");
            }
        }
    }
    Ok(())
}

fn parse(rule_text: &str, json: bool, system: &dyn FeatureSystem) -> Result<()> {
    let rule = parse_rule(rule_text, system)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rule)?);
    } else {
        println!("source:  {}", rule.source);
        println!("ante:    {:?}", rule.ante);
        println!("post:    {:?}", rule.post);
        match &rule.context {
            Some(context) => println!("context: {context:?}"),
            None => println!("context: (none)"),
        }
    }
    Ok(())
}

fn run_syllabify(word: &str, s_cluster: bool, json: bool, system: &dyn FeatureSystem) -> Result<()> {
    let sounds: Vec<_> = parse_sequence(word, system)
        .iter()
        .filter_map(|e| e.as_sound().cloned())
        .collect();
    let constraints = SyllableConstraints {
        allow_s_cluster: s_cluster,
        ..Default::default()
    };
    let result = syllabify(&sounds, system, &constraints);
    if json {
        let syllables: Vec<serde_json::Value> = result
            .syllables
            .iter()
            .map(|syl| {
                serde_json::json!({
                    "onset": syl.onset.iter().map(|s| s.grapheme.clone()).collect::<Vec<_>>(),
                    "nucleus": syl.nucleus.iter().map(|s| s.grapheme.clone()).collect::<Vec<_>>(),
                    "coda": syl.coda.iter().map(|s| s.grapheme.clone()).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&syllables)?);
    } else {
        println!("{result}");
    }
    Ok(())
}

fn distance(a: &str, b: &str, json: bool, system: &dyn FeatureSystem) -> Result<()> {
    let value = grapheme_distance(a, b, system);
    if json {
        println!("{}", serde_json::json!({ "a": a, "b": b, "distance": value }));
    } else {
        println!("{value:.4}");
    }
    Ok(())
}

fn systems(json: bool) -> Result<()> {
    let names = list_systems();
    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}
