//! rowdeck - live console for the device fleet database.
//!
//! Usage:
//!   rowdeck --demo                          # in-memory demo data, user admin/admin
//!   rowdeck --pg-host db --pg-user app      # PostgreSQL (PG* variables also work)
//!   rowdeck --install-trigger devices       # publish changes of a table, then exit
//!   rowdeck --log-file /tmp/rowdeck.log -v  # debug log to a file

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tikv_jemallocator::Jemalloc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use rowdeck::config::{Config, parse_feature_list};
use rowdeck::device::{DeviceControl, HttpDeviceControl, StoreDevices};
use rowdeck::store::{MemoryStore, PgConfig, PgStore, Store};
use rowdeck::tui::App;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Table whose rows are devices with a `connected` flag.
const DEVICES_TABLE: &str = "devices";

/// Log file used when only RUST_LOG asks for logging.
const DEFAULT_LOG_FILE: &str = "rowdeck.log";

/// Live console for the device fleet database.
#[derive(Parser)]
#[command(name = "rowdeck", about = "Live table console for a device fleet database")]
struct Args {
    /// Run against built-in demo data instead of PostgreSQL.
    #[arg(long)]
    demo: bool,

    /// PostgreSQL host (default: $PGHOST or localhost).
    #[arg(long, value_name = "HOST")]
    pg_host: Option<String>,

    /// PostgreSQL port (default: $PGPORT or 5432).
    #[arg(long, value_name = "PORT")]
    pg_port: Option<u16>,

    /// Service role for data access (default: $PGUSER or $USER).
    #[arg(long, value_name = "USER")]
    pg_user: Option<String>,

    /// Password of the service role (default: $PGPASSWORD).
    #[arg(long, value_name = "PASSWORD")]
    pg_password: Option<String>,

    /// Database name (default: $PGDATABASE or the user name).
    #[arg(long, value_name = "DB")]
    pg_database: Option<String>,

    /// Connect to PostgreSQL over TLS.
    #[arg(long)]
    pg_tls: bool,

    /// Key that signs session tokens. Without it, sessions end with the process.
    #[arg(long, env = "ROWDECK_SESSION_SECRET", hide_env_values = true)]
    session_secret: Option<String>,

    /// Base URL of the device service. Without it, the `connected` flag is
    /// written directly to the devices table.
    #[arg(long, env = "ROWDECK_DEVICE_API", value_name = "URL")]
    device_api: Option<String>,

    /// Timeout of device service requests in seconds.
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    device_timeout: u64,

    /// Where the session token is kept.
    #[arg(long, value_name = "PATH")]
    session_file: Option<PathBuf>,

    /// Write logs to this file. Logging is off unless this or RUST_LOG is set.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// UI refresh interval in milliseconds.
    #[arg(long, default_value_t = 250, value_name = "MS")]
    tick_ms: u64,

    /// Comma-separated options of the `features` field (default: QQMusic,Tidal,USB).
    #[arg(long, value_name = "LIST")]
    features: Option<String>,

    /// Install the change notification trigger on TABLE and exit.
    #[arg(long, value_name = "TABLE", conflicts_with = "demo")]
    install_trigger: Option<String>,
}

fn main() {
    let args = Args::parse();

    let log_file = args.log_file.clone().or_else(|| {
        std::env::var_os("RUST_LOG").map(|_| PathBuf::from(DEFAULT_LOG_FILE))
    });
    if let Some(path) = &log_file
        && let Err(e) = init_logging(args.verbose, path)
    {
        eprintln!("Error: cannot open log file {}: {}", path.display(), e);
        std::process::exit(1);
    }

    if let Some(table) = &args.install_trigger {
        let store = PgStore::new(pg_config(&args));
        match store.install_notify_trigger(table) {
            Ok(()) => println!("Change notifications enabled for {}", table),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let (store, devices) = match backend(&args) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut config = Config::default()
        .with_tick_rate(Duration::from_millis(args.tick_ms.max(10)));
    if let Some(path) = args.session_file {
        config = config.with_session_path(path);
    }
    if let Some(list) = &args.features {
        config = config.with_feature_options(parse_feature_list(list));
    }

    tracing::info!(demo = args.demo, session = %config.session_path.display(), "starting console");
    if let Err(e) = App::new(store, devices, config).run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn pg_config(args: &Args) -> PgConfig {
    let mut config = PgConfig::from_env();
    if let Some(host) = &args.pg_host {
        config.host = host.clone();
    }
    if let Some(port) = args.pg_port {
        config.port = port;
    }
    if let Some(user) = &args.pg_user {
        config.user = user.clone();
    }
    if let Some(password) = &args.pg_password {
        config.password = Some(password.clone());
    }
    if let Some(database) = &args.pg_database {
        config.database = database.clone();
    }
    config.tls = args.pg_tls;
    config.session_secret = args.session_secret.clone();
    config
}

/// Builds the store and the device control the console talks to.
fn backend(args: &Args) -> Result<(Arc<dyn Store>, Arc<dyn DeviceControl>), String> {
    let store: Arc<dyn Store> = if args.demo {
        Arc::new(MemoryStore::demo_devices())
    } else {
        Arc::new(PgStore::new(pg_config(args)))
    };

    let devices: Arc<dyn DeviceControl> = match &args.device_api {
        Some(url) if !args.demo => Arc::new(
            HttpDeviceControl::new(url, Duration::from_secs(args.device_timeout))
                .map_err(|e| e.to_string())?,
        ),
        _ => Arc::new(StoreDevices::new(Arc::clone(&store), DEVICES_TABLE)),
    };
    Ok((store, devices))
}

fn init_logging(verbose: u8, path: &Path) -> std::io::Result<()> {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("rowdeck={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
