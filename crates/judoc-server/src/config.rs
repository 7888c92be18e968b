use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use judoc_engine::{BackendOptions, EngineConfig, Strategy, DEFAULT_BLOCK_SIZE, DEFAULT_SCAN_PAGE_SIZE};
use judoc_types::Consistency;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Which row store the server runs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Process-local rows, lost on exit.
    #[default]
    Memory,
    /// Scylla / Cassandra cluster. Needs the `scylla` feature.
    Scylla,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Scylla => f.write_str("scylla"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "scylla" | "cassandra" => Ok(Self::Scylla),
            other => Err(format!("unknown backend `{other}` (expected memory or scylla)")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub backend: BackendKind,
    /// Cluster contact points.
    pub cluster: Vec<String>,
    pub keyspace: String,
    pub block_size: usize,
    /// Write consistency. Reads always use `ONE`.
    pub consistency: Consistency,
    pub strategy: Strategy,
    pub scan_page_size: usize,
    /// Bound on every backend call, in seconds.
    pub request_timeout_secs: u64,
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9122)),
            backend: if cfg!(feature = "scylla") {
                BackendKind::Scylla
            } else {
                BackendKind::Memory
            },
            cluster: vec!["127.0.0.1".into()],
            keyspace: "judoc".into(),
            block_size: DEFAULT_BLOCK_SIZE,
            consistency: Consistency::Any,
            strategy: Strategy::IndexRow,
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            request_timeout_secs: 60,
            tls: None,
        }
    }
}

/// TLS material for the cluster connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub ca_path: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl TlsConfig {
    pub fn is_empty(&self) -> bool {
        self.ca_path.is_none() && self.cert_path.is_none() && self.key_path.is_none()
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load from a TOML file; missing fields take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.block_size == 0 {
            return Err(ServerError::Config("block_size must be positive".into()));
        }
        if self.scan_page_size == 0 {
            return Err(ServerError::Config("scan_page_size must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ServerError::Config("request_timeout_secs must be positive".into()));
        }
        if self.backend == BackendKind::Scylla {
            if self.cluster.iter().all(|node| node.trim().is_empty()) {
                return Err(ServerError::Config("cluster must list at least one node".into()));
            }
            if self.keyspace.trim().is_empty() {
                return Err(ServerError::Config("keyspace must not be empty".into()));
            }
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            block_size: self.block_size,
            strategy: self.strategy,
            scan_page_size: self.scan_page_size,
            backend: BackendOptions {
                write_consistency: self.consistency,
                timeout: self.timeout(),
                ..Default::default()
            },
        }
    }
}
