use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flurry::{Backoff, BitLayout, Policy, RandSource, TimeSource, Worker};

/// Runtime configuration for the `flurry` binary.
///
/// Every generator setting can be given as a flag or through the environment
/// (a `.env` file in the working directory is loaded first). The defaults
/// describe the classic 41/10/12 Snowflake split on the Unix epoch.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "flurry",
    version,
    about = "Generate and inspect Snowflake-style 63-bit IDs"
)]
pub struct CliArgs {
    #[command(flatten)]
    pub generator: GeneratorArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate new IDs, one per line.
    Generate {
        /// Number of IDs to generate.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u64,

        /// Print each ID with its decoded fields as a JSON object.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Decode existing IDs using the configured layout.
    Inspect {
        /// IDs to decode.
        #[arg(required = true)]
        ids: Vec<i64>,

        /// Print the decoded fields as JSON objects.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GeneratorArgs {
    /// Milliseconds since the Unix epoch that map to timestamp zero.
    ///
    /// Environment variable: `FLURRY_START_EPOCH_MS`
    #[arg(long, env = "FLURRY_START_EPOCH_MS", default_value_t = 0, global = true)]
    pub start_epoch_ms: i64,

    /// Width of the timestamp field.
    ///
    /// Environment variable: `FLURRY_TIMESTAMP_BITS`
    #[arg(long, env = "FLURRY_TIMESTAMP_BITS", default_value_t = 41, global = true)]
    pub timestamp_bits: u8,

    /// Width of the clock-sequence field used to absorb clock rollbacks.
    ///
    /// Environment variable: `FLURRY_CLOCK_SEQUENCE_BITS`
    #[arg(long, env = "FLURRY_CLOCK_SEQUENCE_BITS", default_value_t = 0, global = true)]
    pub clock_sequence_bits: u8,

    /// Width of the machine-id field.
    ///
    /// Environment variable: `FLURRY_MACHINE_ID_BITS`
    #[arg(long, env = "FLURRY_MACHINE_ID_BITS", default_value_t = 10, global = true)]
    pub machine_id_bits: u8,

    /// Width of the per-tick sequence field.
    ///
    /// Environment variable: `FLURRY_SEQUENCE_BITS`
    #[arg(long, env = "FLURRY_SEQUENCE_BITS", default_value_t = 12, global = true)]
    pub sequence_bits: u8,

    /// Machine id embedded in generated IDs. Must be unique among the
    /// generators sharing a layout.
    ///
    /// Environment variable: `FLURRY_MACHINE_ID`
    #[arg(long, env = "FLURRY_MACHINE_ID", default_value_t = 0, global = true)]
    pub machine_id: i64,

    /// How the timestamp advances.
    ///
    /// Environment variable: `FLURRY_POLICY`
    #[arg(long, env = "FLURRY_POLICY", value_enum, default_value_t = PolicyArg::LogicalTick, global = true)]
    pub policy: PolicyArg,

    /// Time source used by the generator.
    ///
    /// Environment variable: `FLURRY_CLOCK`
    #[arg(long, env = "FLURRY_CLOCK", value_enum, default_value_t = ClockArg::System, global = true)]
    pub clock: ClockArg,

    /// Retries made by the wall-clock policy before giving up.
    ///
    /// Environment variable: `FLURRY_RETRIES`
    #[arg(long, env = "FLURRY_RETRIES", default_value_t = 3, global = true)]
    pub retries: u32,

    /// Shortest backoff between retries, in milliseconds.
    ///
    /// Environment variable: `FLURRY_BACKOFF_MIN_MS`
    #[arg(long, env = "FLURRY_BACKOFF_MIN_MS", default_value_t = 1, global = true)]
    pub backoff_min_ms: u64,

    /// Longest backoff between retries, in milliseconds.
    ///
    /// Environment variable: `FLURRY_BACKOFF_MAX_MS`
    #[arg(long, env = "FLURRY_BACKOFF_MAX_MS", default_value_t = 5, global = true)]
    pub backoff_max_ms: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    /// Read the clock once; advance by sequence overflow.
    LogicalTick,
    /// Read the clock on every call; back off on rollback.
    WallClock,
}

impl From<PolicyArg> for Policy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::LogicalTick => Self::LogicalTick,
            PolicyArg::WallClock => Self::WallClock,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockArg {
    /// The operating system's wall clock.
    System,
    /// Wall clock sampled once, then advanced monotonically.
    Monotonic,
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub layout: BitLayout,
    pub machine_id: i64,
    pub policy: Policy,
    pub clock: ClockArg,
    pub backoff: Backoff,
}

impl GeneratorConfig {
    /// Builds the worker described by this configuration.
    pub fn worker<T, R>(&self, time: T, rand: R) -> anyhow::Result<Worker<T, R>>
    where
        T: TimeSource<i64>,
        R: RandSource<u64>,
    {
        let worker = Worker::with_sources(self.layout, self.machine_id, self.policy, time, rand)
            .context("failed to create worker")?;
        Ok(worker.with_backoff(self.backoff))
    }
}

impl TryFrom<GeneratorArgs> for GeneratorConfig {
    type Error = anyhow::Error;

    fn try_from(args: GeneratorArgs) -> Result<Self, Self::Error> {
        let layout = BitLayout::with_clock_sequence(
            args.start_epoch_ms,
            args.timestamp_bits,
            args.clock_sequence_bits,
            args.machine_id_bits,
            args.sequence_bits,
        )
        .context("invalid bit layout")?;

        let max_machine_id = layout.max_machine_id();
        if !(0..=max_machine_id).contains(&args.machine_id) {
            bail!(
                "FLURRY_MACHINE_ID ({}) is outside the machine id space of the layout (max = {})",
                args.machine_id,
                max_machine_id
            );
        }

        if args.backoff_min_ms > args.backoff_max_ms {
            bail!(
                "FLURRY_BACKOFF_MIN_MS ({}) must not exceed FLURRY_BACKOFF_MAX_MS ({})",
                args.backoff_min_ms,
                args.backoff_max_ms
            );
        }

        Ok(Self {
            layout,
            machine_id: args.machine_id,
            policy: args.policy.into(),
            clock: args.clock,
            backoff: Backoff::new(
                args.retries,
                Duration::from_millis(args.backoff_min_ms),
                Duration::from_millis(args.backoff_max_ms),
            ),
        })
    }
}
