use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use semver::Version;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use rpiped::config::Config;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Remote piping relay
#[derive(Debug, Parser)]
#[command(name = "rpiped")]
#[command(about = "A remote piping relay", version, long_about = None)]
struct Cli {
    #[clap(long, default_value = "127.0.0.1:8080", env = "RPIPED_BIND_ADDR")]
    bind_addr: SocketAddr,

    /// Path to persist the channel snapshot across graceful restarts. If
    /// omitted, state is never saved and every restart starts empty.
    #[clap(long, env = "RPIPED_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// OpenSSH-format public key used to verify signed admin requests. If
    /// omitted, every admin request is refused.
    #[clap(long, env = "RPIPED_ADMIN_PUBKEY")]
    admin_pubkey: Option<PathBuf>,

    /// Allow the admin surface over plaintext HTTP.
    #[clap(long, env = "RPIPED_DEBUG")]
    debug: bool,

    #[clap(long, default_value_t = rpiped::constants::DEFAULT_PRUNE_INTERVAL_MS, env = "RPIPED_PRUNE_INTERVAL_MS")]
    prune_interval_ms: u64,

    #[clap(long, default_value_t = rpiped::constants::PIPE_MAX_BYTES, env = "RPIPED_PIPE_MAX_BYTES")]
    pipe_max_bytes: usize,

    #[clap(long, env = "RPIPED_MIN_VERSION")]
    min_version: Option<Version>,

    #[clap(long = "banned-version", env = "RPIPED_BANNED_VERSIONS", value_delimiter = ',')]
    banned_versions: Vec<Version>,

    /// Don't display welcome message
    #[clap(long)]
    no_welcome: bool,
}

impl Cli {
    fn print_welcome_message(&self) {
        if self.no_welcome {
            return;
        }
        eprintln!("rpiped listening on {}", self.bind_addr);
    }
}

fn config_from_args(args: Cli) -> Result<Config> {
    Ok(Config {
        bind_addr: args.bind_addr,
        state_file: args.state_file,
        admin_pubkey: args.admin_pubkey,
        debug: args.debug,
        prune_interval_ms: args.prune_interval_ms,
        pipe_max_bytes: args.pipe_max_bytes,
        min_version: args.min_version.unwrap_or_else(rpiped::version::server_version),
        banned_versions: args.banned_versions,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer().with_ansi(false).with_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            ),
        )
        .init();

    std::panic::set_hook(Box::new(tracing_panic::panic_hook));

    let args = Cli::parse();
    args.print_welcome_message();
    let config = config_from_args(args)?;
    rpiped::run_server(config).await?;

    Ok(())
}
