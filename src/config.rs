use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Psytrack";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listen address for `psytrack serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Evidentiary uploads: maximum size and accepted extensions.
pub const MAX_UPLOAD_MB: u64 = 20;
pub const MAX_UPLOAD_BYTES: u64 = MAX_UPLOAD_MB * 1024 * 1024;
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["pdf", "jpg"];

/// Bearer sessions expire after this many hours.
pub const SESSION_TTL_HOURS: i64 = 12;

/// Default examination interval (days) for a new patient.
pub const DEFAULT_EXAMINATION_INTERVAL_DAYS: i32 = 30;
/// Upper bound on the interval for aggressive patients.
pub const AGGRESSIVE_MAX_INTERVAL_DAYS: i32 = 30;
/// Longest interval (days) any patient may carry.
pub const MAX_EXAMINATION_INTERVAL_DAYS: i32 = 3650;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "psytrack=info,psytrack_lib=info,tower_http=warn"
}

/// Get the application data directory
/// ~/Psytrack/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default database location
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("psytrack.db")
}

/// Default root for uploaded evidentiary files
pub fn default_media_dir() -> PathBuf {
    app_data_dir().join("media")
}

/// Runtime configuration: data locations and listen address.
///
/// Resolved from defaults, then `PSYTRACK_*` environment variables;
/// command-line flags override both.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub bind: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("PSYTRACK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);

        let db_path = lookup("PSYTRACK_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("psytrack.db"));

        let media_dir = lookup("PSYTRACK_MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("media"));

        let bind = lookup("PSYTRACK_BIND")
            .and_then(|v| match v.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(value = %v, error = %e, "Ignoring invalid PSYTRACK_BIND");
                    None
                }
            })
            .unwrap_or_else(default_bind);

        Self { db_path, media_dir, bind }
    }

    /// Configuration rooted at a single directory (tests, portable installs).
    pub fn rooted_at(dir: &std::path::Path) -> Self {
        Self {
            db_path: dir.join("psytrack.db"),
            media_dir: dir.join("media"),
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
