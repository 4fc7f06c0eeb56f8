use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Time-related constants
// =============================================================================

/// Lifetime of the installed-set snapshot (1 hour)
pub const INSTALLED_CACHE_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Trailing debounce applied before an analysis pass starts (ms)
pub const ANALYSIS_DEBOUNCE_MS: u64 = 250;

/// Trailing debounce applied before decorations are flushed to the client (ms)
pub const DECORATION_FLUSH_DEBOUNCE_MS: u64 = 100;

/// Polling interval of the concurrency limiter while waiting for a free slot (ms)
pub const LIMITER_POLL_INTERVAL_MS: u64 = 5;

/// Timeout for registry HTTP requests (30 seconds)
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the log filter directive
pub const LOG_ENV_VAR: &str = "OUTDATED_LSP_LOG";

/// File name prefix of the daily log files
pub const LOG_FILE_PREFIX: &str = "outdated-lsp.log";

/// Client configuration section holding the settings
const SETTINGS_SECTION: &str = "outdated";

/// Keys recognised in a bare settings object
const SETTINGS_KEYS: [&str; 6] = [
    "level",
    "majorUpdateProtection",
    "identifySecurityAdvisories",
    "cacheLifetime",
    "parallelProcessesLimit",
    "decorations",
];

/// Minimum semver bump required for a package to be flagged as outdated
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Patch,
    Minor,
    Major,
}

impl Level {
    /// Ordinal rank used when comparing a version diff against the floor
    pub fn rank(&self) -> i8 {
        match self {
            Level::Patch => 0,
            Level::Minor => 1,
            Level::Major => 2,
        }
    }
}

/// How inline decorations (inlay hints) are rendered
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecorationsMode {
    Disabled,
    Simple,
    #[default]
    Fancy,
}

/// Policy settings read from the client
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub level: Level,
    /// Avoid suggesting a major bump while a non-breaking upgrade exists
    pub major_update_protection: bool,
    pub identify_security_advisories: bool,
    /// Minutes during which fetched registry data is reused
    pub cache_lifetime: u64,
    /// Maximum in-flight package evaluations; zero means unbounded
    pub parallel_processes_limit: usize,
    pub decorations: DecorationsMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: Level::Patch,
            major_update_protection: true,
            identify_security_advisories: true,
            cache_lifetime: 60,
            parallel_processes_limit: 10,
            decorations: DecorationsMode::Fancy,
        }
    }
}

impl Settings {
    pub fn cache_lifetime(&self) -> Duration {
        Duration::from_secs(self.cache_lifetime.saturating_mul(60))
    }

    /// Extract settings from `initializationOptions` or a `didChangeConfiguration` payload.
    ///
    /// Accepts either the object nested under `outdated` or a bare object
    /// naming at least one known setting.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let section = match value.get(SETTINGS_SECTION) {
            Some(section) => section,
            None => {
                let object = value.as_object()?;
                if !SETTINGS_KEYS.iter().any(|key| object.contains_key(*key)) {
                    return None;
                }
                value
            }
        };
        if !section.is_object() {
            return None;
        }
        serde_json::from_value(section.clone()).ok()
    }
}

/// Returns the path to the data directory for outdated-lsp.
/// Uses $XDG_DATA_HOME/outdated-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/outdated-lsp,
/// or ./outdated-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the directory holding rolling log files.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("outdated-lsp")
}
