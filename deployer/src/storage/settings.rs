//! Settings file management

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::deploy::policy::default_restricted_fragments;
use crate::deploy::signatures::SignatureSettings;
use crate::logs::LogLevel;

/// Deployer settings, read from an optional JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Command processor configuration
    #[serde(default)]
    pub tool: ToolSettings,

    /// Database registry API
    #[serde(default)]
    pub registry: ApiSettings,

    /// Issue tracker API
    #[serde(default)]
    pub tracker: ApiSettings,

    /// Directory receiving the log artifacts
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Output line signatures
    #[serde(default)]
    pub signatures: SignatureSettings,

    /// Deny-list of SQL fragments
    #[serde(default = "default_restricted_fragments")]
    pub restricted_fragments: Vec<String>,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            tool: ToolSettings::default(),
            registry: ApiSettings::default(),
            tracker: ApiSettings::default(),
            log_dir: default_log_dir(),
            signatures: SignatureSettings::default(),
            restricted_fragments: default_restricted_fragments(),
        }
    }
}

/// Command processor settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Command line of the command processor, e.g. `sql -L`
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub oracle_home: Option<String>,

    /// Base directory of the per-user wallets
    #[serde(default)]
    pub wallet_dir: Option<PathBuf>,

    #[serde(default)]
    pub tns_admin: Option<PathBuf>,

    /// Per-process timeout; none waits forever
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// REST API settings
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}
