//! # seqshm
//!
//! Operator tool for shared memory streams: resolve logical ids, inspect
//! and tear down segments, and read or publish primitive-typed values
//! from a shell.
//!
//! # Usage
//!
//! ```bash
//! # Which segment backs a stream?
//! seqshm resolve /sensor/gps /motor/speed
//!
//! # Segments on this host, as JSON
//! seqshm list --json
//!
//! # Publish and observe a value
//! seqshm write /motor/speed 1.5 --kind f64
//! seqshm read /motor/speed --kind f64 --watch
//!
//! # Startup hygiene
//! seqshm cleanup
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use seqshm::{Reader, ShmError, ShmPayload, discovery, global_registry, lifecycle, naming};
use seqshm_common::config::{ConfigLoader, IpcConfig, SharedConfig};
use seqshm_common::consts::SHM_PREFIX;
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// seqshm - inspect and drive seqlock shared memory streams
#[derive(Parser, Debug)]
#[command(name = "seqshm")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Inspect and drive seqlock shared memory streams")]
#[command(long_about = None)]
struct Args {
    /// TOML configuration with optional [shared] and [ipc] sections
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `seqshm=trace`.
    /// Overrides the config file and RUST_LOG.
    #[arg(long, value_name = "FILTER", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the segment name each logical id resolves to
    Resolve {
        /// Logical ids, e.g. /sensor/gps
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List segments present on this host
    List {
        /// Name prefix to list (defaults to the build prefix)
        #[arg(long)]
        prefix: Option<String>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Unlink every segment under a prefix
    Cleanup {
        /// Name prefix to remove (defaults to the build prefix)
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Read the latest value of a stream
    Read {
        /// Logical id
        id: String,

        /// Payload type the writer publishes
        #[arg(short, long, value_enum)]
        kind: Kind,

        /// Keep printing every time the value changes
        #[arg(short, long)]
        watch: bool,

        /// Poll interval in watch mode
        #[arg(long, value_name = "MS", default_value_t = 100)]
        interval_ms: u64,
    },

    /// Publish one value on a stream
    Write {
        /// Logical id
        id: String,

        /// Value to publish
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Payload type of the stream
        #[arg(short, long, value_enum)]
        kind: Kind,
    },
}

/// Primitive payload types reachable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

/// Configuration file layout
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CliConfig {
    shared: Option<SharedConfig>,
    #[serde(default)]
    ipc: IpcConfig,
}

impl CliConfig {
    fn load_validated(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::load(path).map_err(|e| format!("{}: {e}", path.display()))?;
        if let Some(shared) = &config.shared {
            shared.validate()?;
        }
        config.ipc.validate()?;
        Ok(config)
    }
}

fn main() {
    if let Err(e) = run() {
        error!("{}", e);
        let code = e
            .downcast_ref::<ShmError>()
            .map(|shm| shm.status_code())
            .filter(|&code| code > 0 && code < 256)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CliConfig::load_validated(path),
        None => Ok(CliConfig::default()),
    };

    let config_level = config
        .as_ref()
        .ok()
        .and_then(|c| c.shared.as_ref())
        .map(|shared| shared.log_level.as_filter());
    setup_tracing(args.log_level.as_deref().or(config_level));

    let config = config?;
    debug!(?config, "Configuration loaded");

    let removed = seqshm::configure(&config.ipc)?;
    if removed > 0 {
        info!(removed, "Removed stale segments on start");
    }

    match args.command {
        Command::Resolve { ids } => {
            for id in &ids {
                println!("{} -> {}", id, naming::resolve(id));
            }
        }
        Command::List { prefix, json } => {
            let prefix = prefix.as_deref().unwrap_or(SHM_PREFIX);
            let segments = discovery::list_segments(prefix)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&segments)?);
            } else {
                print_table(&segments);
            }
        }
        Command::Cleanup { prefix } => {
            let prefix = prefix.as_deref().unwrap_or(SHM_PREFIX);
            let removed = lifecycle::cleanup_with_prefix(prefix)?;
            println!("removed {removed} segment(s)");
        }
        Command::Read {
            id,
            kind,
            watch,
            interval_ms,
        } => {
            let interval = Duration::from_millis(interval_ms.max(1));
            match kind {
                Kind::I32 => read_stream::<i32>(&id, watch, interval)?,
                Kind::U32 => read_stream::<u32>(&id, watch, interval)?,
                Kind::I64 => read_stream::<i64>(&id, watch, interval)?,
                Kind::U64 => read_stream::<u64>(&id, watch, interval)?,
                Kind::F32 => read_stream::<f32>(&id, watch, interval)?,
                Kind::F64 => read_stream::<f64>(&id, watch, interval)?,
            }
        }
        Command::Write { id, value, kind } => match kind {
            Kind::I32 => write_value::<i32>(&id, &value)?,
            Kind::U32 => write_value::<u32>(&id, &value)?,
            Kind::I64 => write_value::<i64>(&id, &value)?,
            Kind::U64 => write_value::<u64>(&id, &value)?,
            Kind::F32 => write_value::<f32>(&id, &value)?,
            Kind::F64 => write_value::<f64>(&id, &value)?,
        },
    }

    Ok(())
}

/// Setup tracing subscriber. Logs go to stderr so stdout stays parseable.
fn setup_tracing(directive: Option<&str>) {
    let filter = match directive {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_value<T>(raw: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("invalid value {raw:?}: {e}"))
}

fn write_value<T>(id: &str, raw: &str) -> Result<(), Box<dyn std::error::Error>>
where
    T: ShmPayload + FromStr + Display,
    T::Err: Display,
{
    let value: T = parse_value(raw)?;
    seqshm::write(&value, id)?;
    info!(id = %id, name = %naming::resolve(id), "Published {}", value);
    Ok(())
}

fn read_stream<T>(id: &str, watch: bool, interval: Duration) -> Result<(), Box<dyn std::error::Error>>
where
    T: ShmPayload + Display,
{
    if !watch {
        println!("{}", seqshm::read::<T>(id)?);
        return Ok(());
    }

    let reader = wait_for_reader::<T>(id, interval)?;
    let mut seen = None;
    loop {
        match reader.read_snapshot() {
            Ok(snapshot) => {
                if seen.is_none_or(|since| reader.has_changed(since)) {
                    println!("{}\t{}", snapshot.sequence / 2, snapshot.value);
                    seen = Some(snapshot.sequence);
                }
            }
            Err(ShmError::NoData { .. }) | Err(ShmError::RetryExhausted { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        std::thread::sleep(interval);
    }
}

/// Attach once the writer has created the segment
fn wait_for_reader<T: ShmPayload>(
    id: &str,
    interval: Duration,
) -> Result<Arc<Reader<T>>, ShmError> {
    let mut announced = false;
    loop {
        match global_registry().get_or_open::<Reader<T>>(id) {
            Ok(reader) => return Ok(reader),
            Err(ShmError::NotFound { .. }) => {
                if !announced {
                    info!(id = %id, "Waiting for a writer to create the stream");
                    announced = true;
                }
                std::thread::sleep(interval);
            }
            Err(e) => return Err(e),
        }
    }
}

fn print_table(segments: &[discovery::SegmentInfo]) {
    if segments.is_empty() {
        println!("no segments");
        return;
    }

    println!("{:<10}  {:>8}  {:<24}  NAME", "HASH", "SIZE", "ID");
    for info in segments {
        let hash = info
            .hash
            .map(|h| h.to_string())
            .unwrap_or_else(|| "-".to_string());
        let id = info.id.as_deref().unwrap_or("-");
        println!("{:<10}  {:>8}  {:<24}  {}", hash, info.size, id, info.name);
    }
}
