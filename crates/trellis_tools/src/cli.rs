//! Command-line interface for the trellis tool

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use trellis::BuildOptions;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Check trellis grammars and inspect their tables")]
#[command(version)]
pub struct Cli {
    /// Log verbosity, overridden by `RUST_LOG`
    #[arg(short, long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read and validate a grammar, then build its tables
    Check {
        /// Grammar file
        input: PathBuf,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Print the tables built for a grammar
    Tables {
        /// Grammar file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Draw the rule dependency graph of a grammar
    Rules {
        /// Grammar file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Table construction switches shared by the subcommands
#[derive(Args, Debug, Clone, Copy)]
pub struct BuildArgs {
    /// Keep conflicts and build tables for the GLR runtime
    #[arg(long)]
    pub glr: bool,

    /// Merge states with identical item cores
    #[arg(long)]
    pub compress: bool,

    /// Declare the `error` token for recovery rules
    #[arg(long)]
    pub error_token: bool,
}

impl From<BuildArgs> for BuildOptions {
    fn from(args: BuildArgs) -> Self {
        Self {
            compress_states: args.compress,
            error_token_support: args.error_token,
            use_glr: args.glr,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Dot,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "dot" | "graphviz" => Ok(Self::Dot),
            _ => Err(format!("unknown format: {s}. Supported: text, json, dot")),
        }
    }
}
