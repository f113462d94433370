//! Configuration types.
//!
//! The bot reads a single YAML file once at startup. The result is an
//! immutable [`BotConfig`] handed to every component that needs it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "LOCALIS_CONFIG";

/// Used when `LOCALIS_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

pub const DEFAULT_ADMIN_CONTACT: &str = "the admin";
pub const DEFAULT_BOT_NAME: &str = "localis";
pub const DEFAULT_BOT_ABOUT: &str = "Your neighborhood watchdog, localis.";
pub const DEFAULT_SIGNAL_CLI: &str = "signal-cli";
pub const DEFAULT_MARKER_PATH: &str = ".bot_configured";
pub const DEFAULT_CARRIER_API_URL: &str = "https://phoneintelligence.abstractapi.com/v1/";

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Account the bot runs as, e.g. `+14155550100`.
    pub bot_number: String,
    /// Area codes routed to the verified group.
    pub allowed_area_codes: HashSet<String>,
    /// Group for members whose area code is allow-listed.
    pub verified_group_id: String,
    /// Holding group for everyone else, pending manual verification.
    pub unverified_group_id: String,
    /// How requesters can reach a human admin.
    pub admin_contact: String,
    pub bot_name: String,
    pub bot_about: String,
    /// Carrier lookup credential. `None` disables the carrier check.
    pub carrier_api_key: Option<SecretString>,
    pub carrier_api_url: String,
    pub carrier_timeout: Duration,
    /// Path to the signal-cli executable.
    pub signal_cli_path: PathBuf,
    /// Marker file recording that the one-time profile setup ran.
    pub marker_path: PathBuf,
    /// Wait before reopening the subscription after a lock conflict.
    pub lock_backoff: Duration,
}

/// Area codes may be written as strings or bare integers in YAML.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AreaCodeEntry {
    Text(String),
    Number(u64),
}

/// On-disk shape of the configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    bot_number: Option<String>,
    allowed_area_codes: Option<Vec<AreaCodeEntry>>,
    #[serde(alias = "real_group_id")]
    verified_group_id: Option<String>,
    #[serde(alias = "decoy_group_id")]
    unverified_group_id: Option<String>,
    admin_contact: Option<String>,
    bot_name: Option<String>,
    bot_about: Option<String>,
    carrier_api_key: Option<String>,
    carrier_api_url: Option<String>,
    carrier_timeout_secs: Option<u64>,
    signal_cli_path: Option<PathBuf>,
    marker_path: Option<PathBuf>,
    lock_backoff_secs: Option<u64>,
}

impl BotConfig {
    /// Resolve the config path from `LOCALIS_CONFIG` and load it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(Path::new(&path))
    }

    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let bot_number = required(raw.bot_number, "bot_number", "The account signal-cli is registered as")?;
        let verified_group_id = required(
            raw.verified_group_id,
            "verified_group_id",
            "Also accepted as real_group_id",
        )?;
        let unverified_group_id = required(
            raw.unverified_group_id,
            "unverified_group_id",
            "Also accepted as decoy_group_id",
        )?;

        let entries = raw
            .allowed_area_codes
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "allowed_area_codes".into(),
                hint: "List the 3-digit area codes admitted to the verified group".into(),
            })?;
        let allowed_area_codes = entries
            .into_iter()
            .map(normalize_area_code)
            .collect::<Result<HashSet<_>, _>>()?;

        let carrier_api_key = raw
            .carrier_api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        Ok(Self {
            bot_number,
            allowed_area_codes,
            verified_group_id,
            unverified_group_id,
            admin_contact: raw
                .admin_contact
                .unwrap_or_else(|| DEFAULT_ADMIN_CONTACT.into()),
            bot_name: raw.bot_name.unwrap_or_else(|| DEFAULT_BOT_NAME.into()),
            bot_about: raw.bot_about.unwrap_or_else(|| DEFAULT_BOT_ABOUT.into()),
            carrier_api_key,
            carrier_api_url: raw
                .carrier_api_url
                .unwrap_or_else(|| DEFAULT_CARRIER_API_URL.into()),
            carrier_timeout: Duration::from_secs(raw.carrier_timeout_secs.unwrap_or(5)),
            signal_cli_path: raw
                .signal_cli_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SIGNAL_CLI)),
            marker_path: raw
                .marker_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MARKER_PATH)),
            lock_backoff: Duration::from_secs(raw.lock_backoff_secs.unwrap_or(1)),
        })
    }

    /// Whether the carrier check is active.
    pub fn carrier_check_enabled(&self) -> bool {
        self.carrier_api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty())
    }
}

fn required(value: Option<String>, key: &str, hint: &str) -> Result<String, ConfigError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingRequired {
            key: key.into(),
            hint: hint.into(),
        }),
    }
}

fn normalize_area_code(entry: AreaCodeEntry) -> Result<String, ConfigError> {
    let code = match entry {
        AreaCodeEntry::Text(s) => s.trim().to_string(),
        AreaCodeEntry::Number(n) => n.to_string(),
    };
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(code)
    } else {
        Err(ConfigError::InvalidValue {
            key: "allowed_area_codes".into(),
            message: format!("'{code}' is not a 3-digit area code"),
        })
    }
}
