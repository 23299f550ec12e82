//! CLI argument definitions.

use clap::{Parser, Subcommand};

/// Top-level command line interface.
#[derive(Parser)]
#[command(name = "soundlaw")]
#[command(about = "Phonological sound-change engine")]
#[command(version)]
pub struct Cli {
    /// Feature system to use (defaults to the registry default)
    #[arg(short = 's', long, global = true)]
    pub system: Option<String>,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Apply a rule forward to one or more words
    Apply {
        /// Sound-change rule, e.g. "p > b / V _ V"
        rule: String,

        /// Words as space-separated segments, e.g. "a p a"
        #[arg(required = true)]
        words: Vec<String>,

        /// Per-site application probability (gradient application)
        #[arg(long)]
        strength: Option<f64>,

        /// RNG seed for gradient application
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Enumerate proto-forms that could have produced the given words
    Reconstruct {
        /// Sound-change rule, e.g. "p > b / V _ V"
        rule: String,

        /// Words as space-separated segments
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Parse a rule and print its structure
    Parse {
        /// Sound-change rule text
        rule: String,
    },

    /// Syllabify a word
    Syllabify {
        /// Word as space-separated segments
        word: String,

        /// Allow SSP-violating s-initial onset clusters
        #[arg(long)]
        s_cluster: bool,
    },

    /// Distance between two sounds under the feature system
    Distance {
        /// First grapheme
        a: String,
        /// Second grapheme
        b: String,
    },

    /// List the registered feature systems
    Systems,
}
