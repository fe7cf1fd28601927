use anyhow::{Context, bail};
use clap::Parser;
use uidring::{DEFAULT_EPOCH_STR, GeneratorConfig};

/// Command-line and environment configuration for `uidring-cli`.
///
/// Every flag can also be set through the environment variable named next to
/// it; a `.env` file in the working directory is loaded first.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uidring-cli",
    version,
    about = "Generate or decode Snowflake-style 63-bit UIDs"
)]
pub struct CliArgs {
    /// Number of UIDs to print, one per line.
    ///
    /// Environment variable: `UID_COUNT`
    #[arg(short = 'n', long, env = "UID_COUNT", default_value_t = 1)]
    pub count: usize,

    /// Decode this UID instead of generating new ones, printed as JSON.
    ///
    /// Environment variable: `UID_PARSE`
    #[arg(short, long, env = "UID_PARSE", value_name = "UID")]
    pub parse: Option<u64>,

    /// Worker ID stamped into every UID. Must be unique among processes
    /// generating concurrently with the same layout and epoch.
    ///
    /// Environment variable: `WORKER_ID`
    #[arg(short, long, env = "WORKER_ID", default_value_t = 0)]
    pub worker_id: u64,

    /// Bits for seconds since the epoch.
    ///
    /// Environment variable: `TIMESTAMP_BITS`
    #[arg(long, env = "TIMESTAMP_BITS", default_value_t = 28)]
    pub timestamp_bits: u8,

    /// Bits for the worker ID.
    ///
    /// Environment variable: `WORKER_ID_BITS`
    #[arg(long, env = "WORKER_ID_BITS", default_value_t = 22)]
    pub worker_id_bits: u8,

    /// Bits for the per-second sequence. The three bit counts must add up
    /// to 63.
    ///
    /// Environment variable: `SEQUENCE_BITS`
    #[arg(long, env = "SEQUENCE_BITS", default_value_t = 13)]
    pub sequence_bits: u8,

    /// Epoch as `YYYY-MM-DD`, midnight UTC.
    ///
    /// Environment variable: `UID_EPOCH`
    #[arg(long, env = "UID_EPOCH", default_value_t = String::from(DEFAULT_EPOCH_STR))]
    pub epoch: String,

    /// The cached ring holds `2^sequence_bits << boost_power` UIDs.
    ///
    /// Environment variable: `BOOST_POWER`
    #[arg(long, env = "BOOST_POWER", default_value_t = 3)]
    pub boost_power: u8,

    /// Refill the cached ring once fewer than this percentage of slots are
    /// unread.
    ///
    /// Environment variable: `PADDING_FACTOR`
    #[arg(long, env = "PADDING_FACTOR", default_value_t = 50)]
    pub padding_factor: u8,

    /// Serve UIDs from the pre-filled ring buffer instead of reading the
    /// clock per UID.
    ///
    /// Environment variable: `UID_CACHED`
    #[arg(short, long, env = "UID_CACHED", default_value_t = false)]
    pub cached: bool,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub generator: GeneratorConfig,
    pub worker_id: u64,
    pub count: usize,
    pub parse: Option<u64>,
    pub cached: bool,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.count == 0 {
            bail!("UID_COUNT must be greater than 0");
        }

        let generator = GeneratorConfig {
            timestamp_bits: args.timestamp_bits,
            worker_id_bits: args.worker_id_bits,
            sequence_bits: args.sequence_bits,
            epoch: args.epoch,
            boost_power: args.boost_power,
            padding_factor: args.padding_factor,
            schedule_interval: None,
        };

        let layout = generator.layout().context("invalid bit layout")?;
        generator.epoch_seconds().context("invalid UID_EPOCH")?;
        generator.checked_padding_factor()?;
        if args.cached {
            generator
                .buffer_size()
                .context("BOOST_POWER is too large for this layout")?;
        }

        if args.worker_id > layout.max_worker_id() {
            bail!(
                "WORKER_ID ({}) exceeds available worker ID space (max = {})",
                args.worker_id,
                layout.max_worker_id()
            );
        }

        Ok(Self {
            generator,
            worker_id: args.worker_id,
            count: args.count,
            parse: args.parse,
            cached: args.cached,
        })
    }
}
