//! Application configuration
//!
//! Configuration loaded from .repo-kit.toml, with environment overrides
//! (a `.env` file in the working directory is honored).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub const ENV_CLIENT_ID: &str = "REPO_KIT_OAUTH_CLIENT_ID";
pub const ENV_REDIRECT_URL: &str = "REPO_KIT_OAUTH_REDIRECT_URL";
pub const ENV_SCOPE: &str = "REPO_KIT_OAUTH_SCOPE";
pub const ENV_PLC_DIRECTORY: &str = "REPO_KIT_PLC_DIRECTORY";
pub const ENV_HANDLE_RESOLVER: &str = "REPO_KIT_HANDLE_RESOLVER";

/// Application configuration loaded from .repo-kit.toml
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// OAuth client id; the loopback development client is used when unset
    #[serde(default)]
    pub oauth_client_id: Option<String>,

    /// Redirect URL the authorization server sends the browser back to
    #[serde(default = "default_redirect_url")]
    pub oauth_redirect_url: String,

    /// Scope requested at login
    #[serde(default = "default_scope")]
    pub oauth_scope: String,

    /// PLC directory resolving `did:plc` documents
    #[serde(default = "default_plc_directory")]
    pub plc_directory: String,

    /// Service resolving handles when the well-known lookup fails
    #[serde(default = "default_handle_resolver")]
    pub handle_resolver: String,

    /// Seconds to wait for the browser redirect
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,

    /// Open the authorization URL in the system browser
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

fn default_redirect_url() -> String {
    "http://127.0.0.1:9876/callback".to_string()
}

fn default_scope() -> String {
    "atproto transition:generic".to_string()
}

fn default_plc_directory() -> String {
    "https://plc.directory".to_string()
}

fn default_handle_resolver() -> String {
    "https://public.api.bsky.app".to_string()
}

fn default_callback_timeout_secs() -> u64 {
    300
}

fn default_open_browser() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            oauth_client_id: None,
            oauth_redirect_url: default_redirect_url(),
            oauth_scope: default_scope(),
            plc_directory: default_plc_directory(),
            handle_resolver: default_handle_resolver(),
            callback_timeout_secs: default_callback_timeout_secs(),
            open_browser: default_open_browser(),
        }
    }
}

impl AppConfig {
    /// Load config from CWD first, then home directory, or use defaults,
    /// then apply environment overrides
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded .env file from: {:?}", path),
            Err(_) => log::debug!(".env file not found, using process environment"),
        }

        let mut config = Self::from_file_content(crate::load_config_file());
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    fn from_file_content(content: Option<String>) -> Self {
        if let Some(content) = content {
            match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded app config from file");
                    return config;
                }
                Err(e) => {
                    log::warn!("Failed to parse config file: {}", e);
                }
            }
        }

        log::debug!("Using default app config");
        Self::default()
    }

    /// Override fields from environment-like lookups (empty values are ignored)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(ENV_CLIENT_ID) {
            self.oauth_client_id = Some(value);
        }
        if let Some(value) = get(ENV_REDIRECT_URL) {
            self.oauth_redirect_url = value;
        }
        if let Some(value) = get(ENV_SCOPE) {
            self.oauth_scope = value;
        }
        if let Some(value) = get(ENV_PLC_DIRECTORY) {
            self.plc_directory = value;
        }
        if let Some(value) = get(ENV_HANDLE_RESOLVER) {
            self.handle_resolver = value;
        }
    }

    /// Redirect URL, parsed
    pub fn redirect_url(&self) -> Result<Url> {
        Url::parse(&self.oauth_redirect_url)
            .with_context(|| format!("Invalid redirect URL '{}'", self.oauth_redirect_url))
    }

    /// OAuth client id
    ///
    /// Without a configured id this is the loopback development client,
    /// `http://localhost?redirect_uri=...&scope=...`.
    pub fn client_id(&self) -> String {
        if let Some(client_id) = &self.oauth_client_id {
            return client_id.clone();
        }

        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect_uri", &self.oauth_redirect_url)
            .append_pair("scope", &self.oauth_scope)
            .finish();
        format!("http://localhost?{}", query)
    }

    pub fn plc_directory_url(&self) -> Result<Url> {
        Url::parse(&self.plc_directory)
            .with_context(|| format!("Invalid PLC directory URL '{}'", self.plc_directory))
    }

    pub fn handle_resolver_url(&self) -> Result<Url> {
        Url::parse(&self.handle_resolver)
            .with_context(|| format!("Invalid handle resolver URL '{}'", self.handle_resolver))
    }
}
