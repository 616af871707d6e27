//! Memoizit operator CLI
//!
//! Lists and invalidates memoized results in the backend selected by the environment.

mod cli;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{parse_kwarg, parse_value, Cli, Command};
use memoizit::{BackendKind, CallArgs, Config, Memoizer};

fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memoizit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={}, redis={}:{}/{}",
        config.backend, config.redis.host, config.redis.port, config.redis.db
    );
    if config.backend == BackendKind::InProcess {
        warn!("In-process backend selected; a fresh process has no memoized entries");
    }

    let memoizer = Memoizer::from_config(&config)?;

    match cli.command {
        Command::Invalidate {
            function,
            args,
            kwargs,
        } => {
            let positional: Vec<Value> = args.iter().map(|raw| parse_value(raw)).collect();
            let keyword = kwargs
                .iter()
                .map(|raw| parse_kwarg(raw))
                .collect::<Result<Vec<_>>>()?;

            let call = CallArgs {
                positional,
                keyword,
            };
            let deleted = memoizer.invalidate(&function, &call)?;
            println!("{}", deleted);
        }
        Command::Keys { prefix } => {
            for key in memoizer.storage().keys_with_prefix(&prefix)? {
                println!("{}", key);
            }
        }
    }

    Ok(())
}
