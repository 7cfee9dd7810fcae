//! redis-mount - Mount a Redis keyspace as a FUSE filesystem.
//!
//! Usage: redis-mount [OPTIONS] <MOUNTPOINT>
//!
//! Keys are split on the delimiter (`:` by default) into directories, so the
//! key `users:42:name` appears as the file `users/42/name`.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use redismount_core::{
    DirPersistence, KeyCodec, KeyScan, KeyspaceFs, KeyspaceOptions, RedisStore, RmdirPolicy,
    StoreConfig,
};
use redismount_fuse::{FuseBackend, MountConfig, RedisMountFs};
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RmdirMode {
    /// Delete every key beneath the directory
    Recursive,
    /// Refuse unless the directory is empty
    RequireEmpty,
}

impl From<RmdirMode> for RmdirPolicy {
    fn from(mode: RmdirMode) -> Self {
        match mode {
            RmdirMode::Recursive => RmdirPolicy::Recursive,
            RmdirMode::RequireEmpty => RmdirPolicy::RequireEmpty,
        }
    }
}

#[derive(Parser)]
#[command(name = "redis-mount")]
#[command(about = "Mount a Redis keyspace as a FUSE filesystem")]
#[command(version)]
struct Cli {
    /// Mountpoint for the filesystem
    mountpoint: PathBuf,

    /// Redis host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Redis port
    #[arg(long, default_value_t = 6379)]
    port: u16,

    /// Redis database number
    #[arg(long, default_value_t = 0)]
    db: i64,

    /// Redis password
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    auth: Option<String>,

    /// Prompt for the Redis password
    #[arg(long, conflicts_with = "auth")]
    ask_pass: bool,

    /// Key delimiter that separates directory levels
    #[arg(long, default_value = ":")]
    sep: String,

    /// What rmdir does with a non-empty directory
    #[arg(long, value_enum, default_value_t = RmdirMode::Recursive)]
    rmdir_policy: RmdirMode,

    /// Keep empty directories across remounts by writing a hidden marker key
    #[arg(long)]
    persist_dirs: bool,

    /// Show keys whose last segment starts with a dot
    #[arg(long)]
    show_dotfiles: bool,

    /// List keys with an incremental SCAN instead of KEYS (optional COUNT hint)
    #[arg(long, value_name = "COUNT", num_args = 0..=1, default_missing_value = "100")]
    scan: Option<usize>,

    /// Disable attribute caching (for keyspaces under heavy outside writes)
    #[arg(long)]
    no_cache: bool,

    /// Mount as read-only (default: read-write)
    #[arg(long)]
    read_only: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    if !cli.mountpoint.is_dir() {
        anyhow::bail!(
            "Mountpoint does not exist or is not a directory: {}",
            cli.mountpoint.display()
        );
    }

    let options = keyspace_options(&cli)?;
    let store_config = store_config(&cli)?;
    let source = format!("redis:{}/{}", store_config.addr(), store_config.db);

    // Connection problems are fatal before anything is mounted.
    let store = RedisStore::connect(&store_config)
        .with_context(|| format!("Failed to connect to {}", store_config.addr()))?;
    store
        .ping()
        .with_context(|| format!("Redis at {} did not answer PING", store_config.addr()))?;

    let mount_config = if cli.no_cache {
        MountConfig::uncached()
    } else {
        MountConfig::default()
    }
    .read_only(cli.read_only);

    let fs = RedisMountFs::new(KeyspaceFs::new(Arc::new(store), options), mount_config);

    // Set up channel for signal handling
    let (tx, rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;

    info!(source = %source, mountpoint = %cli.mountpoint.display(), "Mounting keyspace (press Ctrl+C to unmount)");

    let handle = FuseBackend::new()
        .mount(fs, &source, &cli.mountpoint, cli.read_only)
        .context("Failed to mount filesystem")?;

    match rx.recv() {
        Ok(()) => info!("Received interrupt signal, unmounting..."),
        Err(_) => warn!("Signal channel closed unexpectedly"),
    }

    handle.unmount();
    Ok(())
}

fn keyspace_options(cli: &Cli) -> Result<KeyspaceOptions> {
    let codec = KeyCodec::from_delimiter_str(&cli.sep)
        .with_context(|| format!("Invalid delimiter {:?}", cli.sep))?;
    let persistence = if cli.persist_dirs {
        DirPersistence::MarkerKey
    } else {
        DirPersistence::Memory
    };

    Ok(KeyspaceOptions {
        codec,
        ..KeyspaceOptions::default()
    }
    .hide_dotfiles(!cli.show_dotfiles)
    .rmdir_policy(cli.rmdir_policy.into())
    .dir_persistence(persistence))
}

fn store_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = StoreConfig::new(cli.host.clone(), cli.port).with_db(cli.db);
    if let Some(count) = cli.scan {
        config = config.with_key_scan(KeyScan::Cursor { count });
    }
    if let Some(password) = get_password(cli)? {
        config = config.with_password(password.as_str());
    }
    Ok(config)
}

/// Get password from CLI/environment or prompt. No password means no AUTH.
fn get_password(cli: &Cli) -> Result<Option<Zeroizing<String>>> {
    if let Some(ref pwd) = cli.auth {
        Ok(Some(Zeroizing::new(pwd.clone())))
    } else if cli.ask_pass {
        Ok(Some(Zeroizing::new(
            rpassword::prompt_password("Redis password: ").context("Failed to read password")?,
        )))
    } else {
        Ok(None)
    }
}
