//! Persisted address registry.
//!
//! The registry is a single JSON document mapping network names to contract names to
//! deployed addresses:
//!
//! ```json
//! {
//!   "polygonAmoy": {
//!     "UniswapV2Factory": "0x5fbdb2315678afecb367f032d93f642f64180aa3"
//!   }
//! }
//! ```
//!
//! Absence of a contract entry is the only signal that the contract has not been deployed
//! on that network.

use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use anyhow::Context;
use fs2::FileExt;

use crate::DeployError;

/// In-memory form of the registry document. Sorted maps keep the file stable across writes.
pub type RegistryDocument = BTreeMap<String, BTreeMap<String, Address>>;

/// Storage of deployed addresses keyed by network and contract name.
pub trait AddressStore {
    /// Guard proving exclusive ownership of the store for the duration of a run.
    type Guard;

    /// Take the single-writer lock.
    fn acquire(&self) -> Result<Self::Guard, DeployError>;

    /// Create the backing store and the network key if they are absent.
    fn ensure_store(&self, network: &str) -> Result<(), DeployError>;

    /// Look up a deployed address.
    fn get(&self, network: &str, contract: &str) -> Result<Address, DeployError>;

    /// Record a deployed address, overwriting any previous entry.
    fn set(&self, network: &str, contract: &str, address: Address) -> Result<(), DeployError>;
}

/// JSON-file backed [`AddressStore`].
#[derive(Debug, Clone)]
pub struct AddressRegistry {
    path: PathBuf,
}

/// Exclusive lock on a registry file, released on drop.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
    path: PathBuf,
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(err = %e, path = %self.path.display(), "Failed to release registry lock");
        }
    }
}

impl AddressRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn init_error(&self, source: anyhow::Error) -> DeployError {
        DeployError::StoreInitFailed {
            path: self.path.clone(),
            source,
        }
    }

    fn write_error(&self, source: anyhow::Error) -> DeployError {
        DeployError::StoreWriteFailed {
            path: self.path.clone(),
            source,
        }
    }

    /// Whether the registry file exists. An inaccessible path is an error, never "absent".
    fn file_exists(&self) -> Result<bool, DeployError> {
        self.path
            .try_exists()
            .with_context(|| format!("Failed to access {}", self.path.display()))
            .map_err(|e| self.init_error(e))
    }

    /// Read the whole document. A missing file reads as an empty registry.
    pub fn load(&self) -> Result<RegistryDocument, DeployError> {
        if !self.file_exists()? {
            return Ok(RegistryDocument::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))
            .map_err(|e| self.init_error(e))?;

        serde_json::from_str(&content)
            .context("Failed to parse address registry JSON")
            .map_err(|e| self.init_error(e))
    }

    /// Replace the whole document on disk.
    ///
    /// The content is written to a sibling temporary file, synced, then renamed over the
    /// registry so readers never observe a partially written document.
    fn store(&self, document: &RegistryDocument) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(document)
            .context("Failed to serialize address registry")?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let result = write_synced(&tmp_path, json.as_bytes()).and_then(|()| {
            std::fs::rename(&tmp_path, &self.path)
                .with_context(|| format!("Failed to move registry into {}", self.path.display()))
        });

        if result.is_err() && tmp_path.exists() {
            if let Err(e) = std::fs::remove_file(&tmp_path) {
                tracing::warn!(err = %e, path = %tmp_path.display(), "Failed to remove temporary registry file");
            }
        }

        result
    }

    /// All contracts recorded for a network. Unknown networks yield an empty map.
    pub fn contracts(&self, network: &str) -> Result<BTreeMap<String, Address>, DeployError> {
        Ok(self.load()?.remove(network).unwrap_or_default())
    }

    /// All networks present in the registry.
    pub fn networks(&self) -> Result<Vec<String>, DeployError> {
        Ok(self.load()?.into_keys().collect())
    }
}

/// Write `content` to a fresh file and flush it to disk.
fn write_synced(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", path.display()))?;
    Ok(())
}

impl AddressStore for AddressRegistry {
    type Guard = RegistryLock;

    fn acquire(&self) -> Result<RegistryLock, DeployError> {
        let path = self.lock_path();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))
                .map_err(|e| self.init_error(e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))
            .map_err(|e| self.init_error(e))?;

        if file.try_lock_exclusive().is_err() {
            return Err(DeployError::StoreLocked {
                path: self.path.clone(),
            });
        }

        tracing::debug!(path = %path.display(), "Acquired registry lock");

        Ok(RegistryLock { file, path })
    }

    fn ensure_store(&self, network: &str) -> Result<(), DeployError> {
        let existed = self.file_exists()?;
        let mut document = self.load()?;

        if existed && document.contains_key(network) {
            return Ok(());
        }

        document.entry(network.to_string()).or_default();
        self.store(&document).map_err(|e| self.init_error(e))?;

        if existed {
            tracing::debug!(path = %self.path.display(), network, "Added network to registry");
        } else {
            tracing::info!(path = %self.path.display(), network, "Created address registry");
        }

        Ok(())
    }

    fn get(&self, network: &str, contract: &str) -> Result<Address, DeployError> {
        self.load()?
            .get(network)
            .and_then(|contracts| contracts.get(contract))
            .copied()
            .ok_or_else(|| DeployError::NotFound {
                network: network.to_string(),
                contract: contract.to_string(),
            })
    }

    fn set(&self, network: &str, contract: &str, address: Address) -> Result<(), DeployError> {
        let mut document = self.load()?;

        document
            .entry(network.to_string())
            .or_default()
            .insert(contract.to_string(), address);

        self.store(&document).map_err(|e| self.write_error(e))?;

        tracing::info!(network, contract, address = %address, "Recorded address");

        Ok(())
    }
}
