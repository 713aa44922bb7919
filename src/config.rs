use clap::Parser;
use std::path::PathBuf;
use url::Url;

/// QA Dashboard — serves comparison view models derived from a results backend.
#[derive(Parser, Debug, Clone)]
#[command(name = "qa-dashboard")]
pub struct CliArgs {
    /// Base URL of the results backend (the /api/v1 host)
    #[arg(short = 'b', long = "backend-url")]
    pub backend_url: Url,

    /// Dashboard HTTP port
    #[arg(long = "port", default_value_t = DEFAULT_DASHBOARD_PORT)]
    pub port: u16,

    /// Directory for the persisted-slice database (defaults to the platform data dir)
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log file for dashboard output (stdout only when absent)
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Commit poll interval in seconds
    #[arg(long = "poll-interval", default_value_t = COMMIT_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,

    /// Documentation site URL (env fallback: QA_DASHBOARD_DOCS)
    #[arg(long = "docs-url")]
    pub docs_url: Option<String>,

    /// Documentation root path (env fallback: QA_DASHBOARD_DOCS_ROOT)
    #[arg(long = "docs-root")]
    pub docs_root: Option<String>,
}

pub struct DashboardConfig {
    pub backend_url: Url,
    pub port: u16,
    pub data_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub docs_url: Option<String>,
    pub docs_root: Option<String>,
}

// Port constants
pub const DEFAULT_DASHBOARD_PORT: u16 = 9860;

// Fetch constants
pub const COMMIT_POLL_INTERVAL_SECS: u64 = 15;
pub const HTTP_TIMEOUT_SECS: u64 = 10;

// Store constants
pub const STORE_EVENT_CHANNEL_SIZE: usize = 64;

// Persistence constants
pub const PERSIST_DB_FILE: &str = "qa-dashboard.db";

impl DashboardConfig {
    pub fn from_args(args: CliArgs) -> Self {
        let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
        let docs_url = args
            .docs_url
            .or_else(|| std::env::var("QA_DASHBOARD_DOCS").ok());
        let docs_root = args
            .docs_root
            .or_else(|| std::env::var("QA_DASHBOARD_DOCS_ROOT").ok());

        DashboardConfig {
            backend_url: args.backend_url,
            port: args.port,
            data_dir,
            log_file: args.log_file,
            poll_interval_secs: args.poll_interval_secs,
            docs_url,
            docs_root,
        }
    }

    /// Path to the persisted-slice database.
    pub fn persist_db_path(&self) -> PathBuf {
        self.data_dir.join(PERSIST_DB_FILE)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qa-dashboard")
}
