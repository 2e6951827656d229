use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use axon::RuntimeConfig;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("axon=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let mut config_path: Option<String> = None;
    let mut input_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = Some(
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("Missing config file after {arg}"))?,
                );
            }
            _ => {
                input_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one input file is supported");
                }
                break;
            }
        }
    }

    let config = match config_path {
        Some(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?;
            RuntimeConfig::from_yaml_str(&raw).with_context(|| format!("Loading {path}"))?
        }
        None => RuntimeConfig::default(),
    };

    let source = if let Some(path) = input_path {
        fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let outcome = axon::run_with_config(&source, config);
    print!("{}", outcome.stdout());
    if !outcome.status.is_completed() {
        bail!("{}", outcome.status);
    }
    Ok(())
}
