//! Configuration system for the `FadeChat` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/fadechat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error. Unlike the file, the
//! relay endpoint and the key material have no defaults: resolution fails
//! if they are missing, before anything touches the network.

use std::path::PathBuf;
use std::time::Duration;

use crate::chat::SessionConfig;
use crate::crypto::keys::{DerivationScheme, KeyError, SessionKey};
use crate::net::NetConfig;
use crate::transport::relay::ConnectOptions;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// Neither a secret nor a channel password was provided.
    #[error("no key material: set --secret or --password (or [security] secret in the config file)")]
    MissingSecret,

    /// The relay URL or chat id was not provided.
    #[error("missing {0}: set it on the command line or under [network] in the config file")]
    MissingRelay(&'static str),

    /// The session key could not be derived.
    #[error("key derivation failed: {0}")]
    Key(#[from] KeyError),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    network: NetworkFileConfig,
    security: SecurityFileConfig,
    chat: ChatFileConfig,
    ui: UiFileConfig,
}

/// `[network]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NetworkFileConfig {
    relay_url: Option<String>,
    chat_id: Option<String>,
    password: Option<String>,
    connect_timeout_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

/// `[security]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SecurityFileConfig {
    secret: Option<String>,
    key_derivation: Option<DerivationScheme>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    message_lifetime_secs: Option<u64>,
    max_payload_size: Option<usize>,
    max_duplicate_tracking: Option<usize>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    // -- Network --
    /// Relay server WebSocket URL.
    pub relay_url: String,
    /// Room to join on the relay.
    pub chat_id: String,
    /// Channel password presented to the relay.
    pub password: String,
    /// Timeout for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Channel capacity for command and inbound frame queues.
    pub channel_capacity: usize,

    // -- Security --
    /// Key material: the configured secret, or the password when none is set.
    secret: String,
    /// How the session key is derived from `secret`.
    pub key_derivation: DerivationScheme,

    // -- Chat --
    /// Session tunables (lifetime, payload limit, duplicate window).
    pub session: SessionConfig,

    // -- UI --
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("relay_url", &self.relay_url)
            .field("chat_id", &self.chat_id)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("channel_capacity", &self.channel_capacity)
            .field("secret", &"<redacted>")
            .field("key_derivation", &self.key_derivation)
            .field("session", &self.session)
            .field("poll_timeout", &self.poll_timeout)
            .field("timestamp_format", &self.timestamp_format)
            .finish()
    }
}

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default channel capacity.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Default TUI poll timeout.
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(50);

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path
    /// (`~/.config/fadechat/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read or
    /// parsed, or if the relay endpoint or key material is missing.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. The secret falls back to the channel
    /// password; an empty value counts as missing.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let relay_url = non_empty(cli.relay_url.as_ref().or(file.network.relay_url.as_ref()))
            .ok_or(ConfigError::MissingRelay("relay URL"))?;
        let chat_id = non_empty(cli.chat_id.as_ref().or(file.network.chat_id.as_ref()))
            .ok_or(ConfigError::MissingRelay("chat id"))?;
        let password = non_empty(cli.password.as_ref().or(file.network.password.as_ref()));
        let secret = non_empty(cli.secret.as_ref().or(file.security.secret.as_ref()))
            .or_else(|| password.clone())
            .ok_or(ConfigError::MissingSecret)?;

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            message_lifetime: cli
                .message_lifetime_secs
                .or(file.chat.message_lifetime_secs)
                .map_or(defaults.message_lifetime, Duration::from_secs),
            max_payload_size: file
                .chat
                .max_payload_size
                .unwrap_or(defaults.max_payload_size),
            max_duplicate_tracking: file
                .chat
                .max_duplicate_tracking
                .unwrap_or(defaults.max_duplicate_tracking),
        };

        Ok(Self {
            relay_url,
            chat_id,
            password: password.unwrap_or_default(),
            connect_timeout: file
                .network
                .connect_timeout_secs
                .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs),
            channel_capacity: file
                .network
                .channel_capacity
                .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
            secret,
            key_derivation: cli
                .key_derivation
                .or(file.security.key_derivation)
                .unwrap_or_default(),
            session,
            poll_timeout: file
                .ui
                .poll_timeout_ms
                .map_or(DEFAULT_POLL_TIMEOUT, Duration::from_millis),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or_else(|| "%H:%M".to_string()),
        })
    }

    /// Derive the session key from the configured key material.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Key`] if derivation fails.
    pub fn session_key(&self) -> Result<SessionKey, ConfigError> {
        Ok(self.key_derivation.derive_key(self.secret.as_bytes())?)
    }

    /// Build a [`NetConfig`], deriving the session key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Key`] if derivation fails.
    pub fn to_net_config(&self) -> Result<NetConfig, ConfigError> {
        Ok(NetConfig {
            relay_url: self.relay_url.clone(),
            chat_id: self.chat_id.clone(),
            password: self.password.clone(),
            key: self.session_key()?,
            connect: ConnectOptions {
                timeout: self.connect_timeout,
                channel_capacity: self.channel_capacity,
            },
            session: self.session.clone(),
            channel_capacity: self.channel_capacity,
        })
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Self-destructing encrypted chat over a WebSocket relay")]
pub struct CliArgs {
    /// WebSocket URL of the relay server (e.g. `ws://localhost:8080/ws`).
    #[arg(long, env = "FADECHAT_RELAY_URL")]
    pub relay_url: Option<String>,

    /// Room to join on the relay.
    #[arg(long, env = "FADECHAT_CHAT_ID")]
    pub chat_id: Option<String>,

    /// Channel password; also the key material when no secret is set.
    #[arg(long, env = "FADECHAT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Shared secret the session key is derived from.
    #[arg(long, env = "FADECHAT_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Key derivation scheme.
    #[arg(long, value_enum)]
    pub key_derivation: Option<DerivationScheme>,

    /// Seconds a message stays on screen.
    #[arg(long)]
    pub message_lifetime_secs: Option<u64>,

    /// Path to config file (default: `~/.config/fadechat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "FADECHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/fadechat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("fadechat").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
