//! Store configuration, persisted as `config.toml` in the store directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use latchkey_pki::DEFAULT_KEY_BITS;
use latchkey_rpc::{RpcConfig, DEFAULT_HANDSHAKE_TIMEOUT, MAX_PAYLOAD_LEN};

use crate::error::{DirectoryError, Result};

/// File name of the configuration inside a store directory.
pub const CONFIG_FILE: &str = "config.toml";

/// File name of the registry database inside a store directory.
pub const REGISTRY_FILE: &str = "users.db";

pub const DEFAULT_SERVER_NAME: &str = "latchkey.local";
pub const DEFAULT_RPC_ADDR: &str = "0.0.0.0:8081";

/// Who signs client certificates, and what clients and server trust.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustMode {
    /// A separate authority signs the server and every client.
    #[default]
    Authority,
    /// The server certificate signs clients and is its own trust anchor.
    SelfSigned,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Host name the server certificate is issued for.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// RSA modulus size for newly issued keys.
    #[serde(default = "default_key_bits")]
    pub key_bits: u32,

    #[serde(default)]
    pub rpc: RpcSection,

    #[serde(default)]
    pub trust: TrustSection,
}

/// `[rpc]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSection {
    /// Listen address.
    pub addr: String,
    /// Server certificate, relative to the store directory unless absolute.
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub handshake_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
    pub max_payload_len: usize,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            addr: DEFAULT_RPC_ADDR.to_string(),
            certificate: PathBuf::from("srv.crt.pem"),
            private_key: PathBuf::from("srv.key.pem"),
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT.as_secs(),
            idle_timeout_secs: None,
            max_payload_len: MAX_PAYLOAD_LEN,
        }
    }
}

/// `[trust]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSection {
    pub mode: TrustMode,
    /// Authority certificate. Unused in self-signed mode.
    pub certificate: PathBuf,
    /// Authority key. Unused in self-signed mode.
    pub private_key: PathBuf,
}

impl Default for TrustSection {
    fn default() -> Self {
        Self {
            mode: TrustMode::Authority,
            certificate: PathBuf::from("ca.crt.pem"),
            private_key: PathBuf::from("ca.key.pem"),
        }
    }
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

fn default_key_bits() -> u32 {
    DEFAULT_KEY_BITS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            key_bits: default_key_bits(),
            rpc: RpcSection::default(),
            trust: TrustSection::default(),
        }
    }
}

impl Config {
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| DirectoryError::io(path, e))?;
        toml::from_str(&text)
            .map_err(|e| DirectoryError::Config(format!("{}: {e}", path.display())))
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| DirectoryError::Config(format!("{}: {e}", path.display())))?;
        fs::write(path, text).map_err(|e| DirectoryError::io(path, e))
    }

    /// Transport settings derived from `[rpc]`.
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            handshake_timeout: Duration::from_secs(self.rpc.handshake_timeout_secs),
            idle_timeout: self.rpc.idle_timeout_secs.map(Duration::from_secs),
            max_payload_len: self.rpc.max_payload_len,
        }
    }
}

/// Resolve a configured path against the store directory.
pub(crate) fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
