//! # Node Key
//!
//! Ed25519 identity of the seed node, persisted as JSON:
//!
//! ```text
//! { "priv_key": "<64 hex chars>" }
//! ```
//!
//! The node id is the first 20 bytes of SHA-256 over the public key.
//!
//! ## Security
//!
//! - The key file is written with permission `0600` on Unix.
//! - Secret bytes never appear in logs or error messages.
//! - A corrupt key file is an error; it is never silently replaced.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use seed_discovery::{NodeId, NODE_ID_LEN};

/// Errors loading or storing the node key.
#[derive(Debug, Error)]
pub enum NodeKeyError {
    /// File could not be read or written.
    #[error("node key I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not `{ "priv_key": hex }`.
    #[error("node key file {path} is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `priv_key` is not 32 hex-encoded bytes.
    #[error("node key file {path} holds an invalid secret key")]
    InvalidKey { path: PathBuf },
}

#[derive(Serialize, Deserialize)]
struct NodeKeyFile {
    priv_key: String,
}

/// The node's signing key and the id derived from it.
pub struct NodeKey {
    signing_key: SigningKey,
}

impl NodeKey {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Key from a 32-byte secret.
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// `sha256(public_key)[..20]`
    pub fn id(&self) -> NodeId {
        let digest = Sha256::digest(self.signing_key.verifying_key().as_bytes());
        let mut bytes = [0u8; NODE_ID_LEN];
        bytes.copy_from_slice(&digest[..NODE_ID_LEN]);
        NodeId::new(bytes)
    }

    /// Load the key at `path`, generating and saving a new one when the
    /// file does not exist.
    pub fn load_or_generate(path: &Path) -> Result<Self, NodeKeyError> {
        if path.exists() {
            return Self::load(path);
        }
        let key = Self::generate();
        key.save(path)?;
        info!(path = %path.display(), id = %key.id(), "Generated new node key");
        Ok(key)
    }

    /// Load an existing key file.
    pub fn load(path: &Path) -> Result<Self, NodeKeyError> {
        let text = fs::read_to_string(path).map_err(|source| NodeKeyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: NodeKeyFile = serde_json::from_str(&text).map_err(|source| NodeKeyError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        let secret: [u8; 32] = hex::decode(file.priv_key.trim())
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| NodeKeyError::InvalidKey {
                path: path.to_path_buf(),
            })?;
        Ok(Self::from_secret(&secret))
    }

    /// Write the key file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), NodeKeyError> {
        let io_err = |source| NodeKeyError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = NodeKeyFile {
            priv_key: hex::encode(self.signing_key.to_bytes()),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| NodeKeyError::Format {
            path: path.to_path_buf(),
            source,
        })?;

        let mut out = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(io_err)?;
        out.write_all(json.as_bytes()).map_err(io_err)?;
        out.sync_all().map_err(io_err)?;
        restrict_permissions(path).map_err(io_err)?;
        Ok(())
    }
}

impl std::fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeKey").field("id", &self.id()).finish_non_exhaustive()
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
