#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::io::{self, BufWriter, Write};

use clap::Parser;
use config::{CliArgs, ClockArg, Command, GeneratorConfig};
use flurry::{
    BitLayout, MonotonicClock, Parts, RandSource, SystemClock, ThreadRandom, TimeSource, Worker,
    decompose,
};
use serde::Serialize;
use telemetry::init_telemetry;

/// One line of `--json` output.
#[derive(Serialize)]
struct Record {
    id: i64,
    #[serde(flatten)]
    parts: Parts,
    unix_millis: i64,
}

impl Record {
    fn new(layout: &BitLayout, id: i64) -> anyhow::Result<Self> {
        let parts = decompose(layout, id)?;
        Ok(Self {
            id,
            parts,
            unix_millis: parts.unix_millis(layout),
        })
    }
}

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let CliArgs { generator, command } = CliArgs::parse();
    init_telemetry()?;

    let config = GeneratorConfig::try_from(generator)?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match command {
        Command::Generate { count, json } => match config.clock {
            ClockArg::System => {
                let worker = config.worker(SystemClock, ThreadRandom)?;
                generate(&worker, count, json, &mut out)?;
            }
            ClockArg::Monotonic => {
                let worker = config.worker(MonotonicClock::new(), ThreadRandom)?;
                generate(&worker, count, json, &mut out)?;
            }
        },
        Command::Inspect { ids, json } => inspect(&config.layout, &ids, json, &mut out)?,
    }

    out.flush()?;
    Ok(())
}

fn generate<T, R>(
    worker: &Worker<T, R>,
    count: u64,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    T: TimeSource<i64>,
    R: RandSource<u64>,
{
    tracing::info!(
        machine_id = worker.machine_id(),
        policy = ?worker.policy(),
        count,
        "generating ids"
    );
    for _ in 0..count {
        let id = worker.generate_id()?;
        write_id(worker.layout(), id, json, out)?;
    }
    Ok(())
}

fn inspect(
    layout: &BitLayout,
    ids: &[i64],
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    for &id in ids {
        if json {
            write_id(layout, id, true, out)?;
        } else {
            let record = Record::new(layout, id)?;
            writeln!(
                out,
                "{id}: timestamp={} clock_sequence={} machine_id={} sequence={} unix_millis={}",
                record.parts.timestamp,
                record.parts.clock_sequence,
                record.parts.machine_id,
                record.parts.sequence,
                record.unix_millis,
            )?;
        }
    }
    Ok(())
}

fn write_id(layout: &BitLayout, id: i64, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, &Record::new(layout, id)?)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{id}")?;
    }
    Ok(())
}
