#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::io::{self, BufWriter, Write};
use std::thread;
use std::time::Duration;

use clap::Parser;
use config::{CliArgs, CliConfig};
use telemetry::init_tracing;
use uidring::{
    CachedUidGenerator, DefaultUidGenerator, Error, FixedWorkerId, SystemClock, UidGenerator,
};

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    init_tracing();

    let worker = FixedWorkerId(config.worker_id);
    let generator: Box<dyn UidGenerator> = if config.cached {
        Box::new(CachedUidGenerator::with_config(
            &config.generator,
            worker,
            SystemClock,
        )?)
    } else {
        Box::new(DefaultUidGenerator::with_config(
            &config.generator,
            worker,
            SystemClock,
        )?)
    };

    let mut out = BufWriter::new(io::stdout().lock());
    if let Some(uid) = config.parse {
        writeln!(out, "{}", generator.parse_uid(uid))?;
    } else {
        tracing::info!(count = config.count, cached = config.cached, "generating uids");
        for _ in 0..config.count {
            writeln!(out, "{}", next_uid(generator.as_ref())?)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Retries transient errors, sleeping the same way the async helpers do.
fn next_uid(generator: &dyn UidGenerator) -> Result<u64, Error> {
    loop {
        match generator.get_uid() {
            Ok(uid) => return Ok(uid),
            Err(Error::BufferEmpty) => thread::sleep(Duration::from_millis(1)),
            Err(Error::ClockRolledBack { seconds_behind }) => {
                tracing::warn!(seconds_behind, "clock moved backwards, waiting");
                thread::sleep(Duration::from_secs(seconds_behind.unsigned_abs()));
            }
            Err(e) => return Err(e),
        }
    }
}
