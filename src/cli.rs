use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use memoizit::memoize::KEY_PREFIX;

#[derive(Debug, Parser)]
#[command(name = "memoizit")]
#[command(about = "Inspect and invalidate memoized results in the configured backend.")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Delete stored results of a function whose leading arguments match
    Invalidate {
        /// Name the function was memoized under
        function: String,

        /// Leading argument values, parsed as JSON (bare words become strings)
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,

        /// Keyword argument appended after the positional ones, as NAME=VALUE
        #[arg(long = "kwarg", value_name = "NAME=VALUE")]
        kwargs: Vec<String>,
    },

    /// List live keys starting with a prefix
    Keys {
        #[arg(default_value = KEY_PREFIX)]
        prefix: String,
    },
}

/// Parses a command-line value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn parse_kwarg(raw: &str) -> Result<(String, Value)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), parse_value(value))),
        _ => bail!("expected NAME=VALUE, got '{}'", raw),
    }
}
