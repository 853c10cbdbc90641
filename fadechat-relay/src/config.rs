//! Configuration system for the `FadeChat` relay server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/fadechat-relay/config.toml`)
//! 4. Compiled defaults
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:8080"
//! max_payload_size = 65536
//! echo_to_sender = false
//!
//! [rooms]
//! room1 = "secret1"
//! room2 = "secret2"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Errors that can occur when loading relay configuration.
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

    /// A room entry has an empty id or password.
    #[error("invalid room entry {0:?}: room id and password must be non-empty")]
    InvalidRoom(String),

    /// No rooms are configured, so nobody could ever join.
    #[error("no rooms configured")]
    NoRooms,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure for the relay.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RelayConfigFile {
    server: ServerFileConfig,
    rooms: Option<BTreeMap<String, String>>,
}

/// `[server]` section of the relay config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_payload_size: Option<usize>,
    echo_to_sender: Option<bool>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the relay server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "FadeChat relay server")]
pub struct RelayCliArgs {
    /// Address to bind the relay server to.
    #[arg(short, long, env = "FADECHAT_RELAY_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/fadechat-relay/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum frame size in bytes; larger frames are dropped.
    #[arg(long)]
    pub max_payload_size: Option<usize>,

    /// Also deliver each frame back to the member that sent it.
    #[arg(long)]
    pub echo_to_sender: bool,

    /// Add or override a room, as `ROOM=PASSWORD`. Repeatable.
    #[arg(long = "room", value_name = "ROOM=PASSWORD", value_parser = parse_room)]
    pub rooms: Vec<(String, String)>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "FADECHAT_RELAY_LOG")]
    pub log_level: String,
}

fn parse_room(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((room, password)) if !room.is_empty() && !password.is_empty() => {
            Ok((room.to_owned(), password.to_owned()))
        }
        _ => Err(format!("expected ROOM=PASSWORD, got {raw:?}")),
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved relay server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Maximum allowed frame size in bytes.
    pub max_payload_size: usize,
    /// Deliver frames back to their sender too.
    pub echo_to_sender: bool,
    /// Room id to password.
    pub rooms: BTreeMap<String, String>,
    /// Log level filter string.
    pub log_level: String,
}

/// Rooms available when nothing else is configured.
#[must_use]
pub fn default_rooms() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("room1".to_owned(), "secret1".to_owned()),
        ("room2".to_owned(), "secret2".to_owned()),
    ])
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_payload_size: 64 * 1024,
            echo_to_sender: false,
            rooms: default_rooms(),
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or the resulting room table is invalid.
    pub fn load(cli: &RelayCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, file)
    }

    /// Resolve a `RelayConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. A `[rooms]` table in the file
    /// replaces the default rooms; `--room` entries are merged on top.
    fn resolve(cli: &RelayCliArgs, file: RelayConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut rooms = file.rooms.unwrap_or(defaults.rooms);
        rooms.extend(cli.rooms.iter().cloned());
        if rooms.is_empty() {
            return Err(ConfigError::NoRooms);
        }
        if let Some((room, _)) = rooms
            .iter()
            .find(|(room, password)| room.is_empty() || password.is_empty())
        {
            return Err(ConfigError::InvalidRoom(room.clone()));
        }

        Ok(Self {
            bind_addr: cli
                .bind
                .clone()
                .or(file.server.bind_addr)
                .unwrap_or(defaults.bind_addr),
            max_payload_size: cli
                .max_payload_size
                .or(file.server.max_payload_size)
                .unwrap_or(defaults.max_payload_size),
            echo_to_sender: cli.echo_to_sender
                || file.server.echo_to_sender.unwrap_or(defaults.echo_to_sender),
            rooms,
            log_level: cli.log_level.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the relay.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<RelayConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(RelayConfigFile::default());
        };
        config_dir.join("fadechat-relay").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
