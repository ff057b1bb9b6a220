use std::{env, fmt, fs, io, net::IpAddr, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uptime::EngineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {1}", path = .0.display())]
    ReadFailed(path::PathBuf, #[source] io::Error),
    #[error("failed to write {path}: {1}", path = .0.display())]
    WriteFailed(path::PathBuf, #[source] io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub ledger: Ledger,
    pub checker: Checker,
    pub status: Status,
    pub engine: Engine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    /// Base URL of the ledger gateway
    pub endpoint: String,
    /// Address of the uptime actor
    pub actor_address: String,
    pub wallet_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checker {
    /// Actor id this checker votes as
    pub actor_id: u64,
    /// Bind address of the ping responder
    pub host: String,
    pub port: u16,
    /// Address advertised to other checkers when `host` is a wildcard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_host: Option<IpAddr>,
    /// Defaults to `checker.key` next to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypair_path: Option<path::PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engine {
    pub poll_interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub max_backoff_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_cache_capacity: Option<usize>,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uptime-checker/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uptime-checker/config.toml"))
}

/// Resolve the file a config is read from
pub fn config_path(optional_path: Option<&path::Path>) -> Result<path::PathBuf, ConfigError> {
    match optional_path {
        Some(path) => Ok(normalize_toml_path(path)),
        None => default_config_path(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: Ledger {
                endpoint: "http://127.0.0.1:1234/api".into(),
                actor_address: String::new(),
                wallet_index: 0,
            },
            checker: Checker {
                actor_id: 0,
                host: "0.0.0.0".into(),
                port: 30000,
                advertise_host: None,
                keypair_path: None,
            },
            status: Status { port: 3000 },
            engine: Engine {
                poll_interval_secs: uptime::DEFAULT_POLL_INTERVAL.as_secs(),
                probe_timeout_secs: uptime::DEFAULT_PROBE_TIMEOUT.as_secs(),
                max_backoff_secs: uptime::DEFAULT_MAX_BACKOFF.as_secs(),
                vote_cache_capacity: None,
            },
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let unset = "-".to_string();

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Ledger")?;
        write_1(f, "Endpoint", &self.ledger.endpoint)?;
        write_1(f, "Actor Address", &self.ledger.actor_address)?;
        write_1(f, "Wallet Index", &self.ledger.wallet_index)?;
        write_title_1(f, "Checker")?;
        write_1(f, "Actor Id", &self.checker.actor_id)?;
        write_1(f, "Bind Address", &format!("{}:{}", self.checker.host, self.checker.port))?;
        match &self.checker.advertise_host {
            Some(host) => write_1(f, "Advertise Host", host)?,
            None => write_1(f, "Advertise Host", &unset)?,
        }
        match &self.checker.keypair_path {
            Some(path) => write_1(f, "Keypair", &path.display())?,
            None => write_1(f, "Keypair", &unset)?,
        }
        write_title_1(f, "Status")?;
        write_1(f, "Port", &self.status.port)?;
        write_title_1(f, "Engine")?;
        write_1(f, "Poll Interval (s)", &self.engine.poll_interval_secs)?;
        write_1(f, "Probe Timeout (s)", &self.engine.probe_timeout_secs)?;
        write_1(f, "Max Backoff (s)", &self.engine.max_backoff_secs)?;
        match self.engine.vote_cache_capacity {
            Some(capacity) => write_1(f, "Vote Cache Capacity", &capacity)?,
            None => write_1(f, "Vote Cache Capacity", &"unbounded")?,
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uptime-checker/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<&path::Path>) -> Result<Self, ConfigError> {
        let config_path = config_path(optional_path)?;

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| ConfigError::ReadFailed(config_path.clone(), err))?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| ConfigError::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| ConfigError::WriteFailed(path.to_path_buf(), err))
    }

    /// Keypair location, relative paths resolved against the config file
    pub fn keypair_path(&self, config_file: &path::Path) -> path::PathBuf {
        let dir = config_file.parent().unwrap_or_else(|| path::Path::new("."));
        match &self.checker.keypair_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => dir.join(path),
            None => dir.join("checker.key"),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig::default()
            .with_poll_interval(Duration::from_secs(self.engine.poll_interval_secs.max(1)))
            .with_probe_timeout(Duration::from_secs(self.engine.probe_timeout_secs.max(1)))
            .with_max_backoff(Duration::from_secs(self.engine.max_backoff_secs.max(1)));

        match self.engine.vote_cache_capacity {
            Some(capacity) => config.with_vote_cache_capacity(capacity),
            None => config,
        }
    }
}
