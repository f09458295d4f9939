//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::deploy::engine;
use crate::deploy::policy::default_restricted_fragments;
use crate::deploy::signatures::SignatureSettings;
use crate::http::client::ApiOptions;
use crate::storage::settings::{ApiSettings, Settings};

/// Default database registry endpoint
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:8080/ords/api/v1/db";

/// Default issue tracker endpoint
pub const DEFAULT_TRACKER_URL: &str = "http://localhost:8081/rest/api/2";

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Command processor configuration
    pub tool: engine::Options,

    /// Database registry API
    pub registry: ApiOptions,

    /// Issue tracker API
    pub tracker: ApiOptions,

    /// Directory receiving the log artifacts
    pub log_dir: PathBuf,

    /// Output line signatures
    pub signatures: SignatureSettings,

    /// Deny-list of SQL fragments
    pub restricted_fragments: Vec<String>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            tool: engine::Options::default(),
            registry: ApiOptions::new(DEFAULT_REGISTRY_URL),
            tracker: ApiOptions::new(DEFAULT_TRACKER_URL),
            log_dir: PathBuf::from("."),
            signatures: SignatureSettings::default(),
            restricted_fragments: default_restricted_fragments(),
        }
    }
}

impl AppOptions {
    /// Build options from settings, falling back to built-in defaults per field
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = engine::Options::default();
        let tool = engine::Options {
            command: settings.tool.command.clone().unwrap_or(defaults.command),
            oracle_home: settings
                .tool
                .oracle_home
                .clone()
                .unwrap_or(defaults.oracle_home),
            wallet_dir: settings
                .tool
                .wallet_dir
                .clone()
                .unwrap_or(defaults.wallet_dir),
            tns_admin: settings.tool.tns_admin.clone(),
            timeout: settings.tool.timeout_secs.map(Duration::from_secs),
        };

        Self {
            tool,
            registry: api_options(&settings.registry, DEFAULT_REGISTRY_URL),
            tracker: api_options(&settings.tracker, DEFAULT_TRACKER_URL),
            log_dir: settings.log_dir.clone(),
            signatures: settings.signatures.clone(),
            restricted_fragments: settings.restricted_fragments.clone(),
        }
    }
}

fn api_options(settings: &ApiSettings, default_url: &str) -> ApiOptions {
    let mut options =
        ApiOptions::new(settings.base_url.as_deref().unwrap_or(default_url));
    options.user = settings.user.clone().unwrap_or_default();
    options.password = SecretString::from(settings.password.clone().unwrap_or_default());
    options.accept_invalid_certs = settings.accept_invalid_certs;
    options
}
