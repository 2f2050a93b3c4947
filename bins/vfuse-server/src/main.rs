use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use vfuse_fs::RelayFs;
use vfuse_net::TcpAcceptor;

mod config;

use config::ServerConfig;

/// Relay filesystem server: accepts one peer and forwards every filesystem
/// operation to it.
#[derive(Parser, Debug)]
#[command(name = "vfuse-server", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "vfuse-server.toml")]
    config: PathBuf,

    /// Address to accept the peer on
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Mount point path
    #[arg(short, long)]
    mountpoint: Option<PathBuf>,

    /// Log every relayed operation (-vv for wire-level tracing)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dump default configuration and exit
    #[arg(long)]
    dump_default_config: bool,
}

impl Args {
    fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(mountpoint) = &self.mountpoint {
            config.mountpoint = Some(mountpoint.clone());
        }
        config.log = config.log.with_verbosity(self.verbose);
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.dump_default_config {
        print!("{}", ServerConfig::default().to_toml()?);
        return Ok(());
    }

    let config = args.apply(ServerConfig::load_or_default(&args.config)?);
    let _log_guard = vfuse_logging::init_logging(&config.log)?;

    info!(
        config = %args.config.display(),
        listen = %config.listen,
        mountpoint = ?config.mountpoint,
        "starting relay server"
    );

    let acceptor = TcpAcceptor::bind(config.listen).await?;
    let fs = RelayFs::new(acceptor, config.relay.clone());
    let conn = fs.connection().clone();

    tokio::select! {
        res = conn.ensure_connected() => res?,
        res = wait_for_shutdown_signal() => {
            res?;
            info!("shut down before a peer connected");
            return Ok(());
        }
    }

    tokio::select! {
        _ = conn.closed() => warn!("relay connection lost"),
        res = wait_for_shutdown_signal() => res?,
    }

    conn.shutdown().await;
    info!("relay server stopped");
    Ok(())
}

/// Wait for CTRL+C or SIGTERM.
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("received CTRL+C");
        }
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
    Ok(())
}
