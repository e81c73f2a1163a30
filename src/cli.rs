// src/cli.rs

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

/// Run and grade algorithm solutions (JavaScript / Python / Java / C++).
///
/// `algograde.yaml` holds the defaults.
/// CLI flags only override config values.
#[derive(Parser, Debug)]
#[command(name = "algograde", version, disable_help_subcommand = true)]
pub struct Cli {
    /// Path to config file
    ///
    /// A missing file means built-in defaults.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// How results are printed
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Simple)]
    pub output: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable, coloured when stdout is a terminal
    Simple,
    /// Indented JSON
    Pretty,
    /// One line of JSON
    Json,
}

/// All supported CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a solution once and print what it produced.
    Run {
        /// Source file
        file: PathBuf,

        /// Language id (inferred from the file extension when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Text passed to the program
        #[arg(short, long)]
        input: Option<String>,

        /// Override execution.timeout_ms
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Run a solution against the fixtures of a suite file.
    Test {
        /// Source file
        file: PathBuf,

        /// Suite file with fixtures
        ///
        /// Example:
        /// --fixtures sort.suite.yaml
        #[arg(short, long)]
        fixtures: PathBuf,

        /// Language id (inferred when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Re-run when the solution or suite changes
        #[arg(long)]
        watch: bool,
    },

    /// Grade a solution against a catalog algorithm.
    Grade {
        /// Source file
        file: PathBuf,

        /// Algorithm id in the fixture catalog
        #[arg(short, long)]
        algorithm: u32,

        /// Language id (inferred when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Override grading.threshold
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,
    },

    /// CI mode.
    ///
    /// Grades every `*.suite.yaml` below ROOT, prints one JSON summary and
    /// exits non-zero if any suite is invalid.
    Check {
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Start the HTTP runtime.
    Serve {
        /// Override server.addr
        #[arg(long)]
        addr: Option<String>,
    },

    /// List the languages that can be executed.
    Languages,

    /// Initialise a project scaffold.
    ///
    /// Creates:
    /// - algograde.yaml
    /// - sort.suite.yaml
    /// - a starter solution
    Init {
        /// Starter solution language (default python)
        #[arg(value_parser = ["js", "javascript", "py", "python", "java", "cpp"])]
        language: Option<String>,
    },
}
