//! Compiled contract artifacts.
//!
//! Artifacts follow the Hardhat output layout: each contract has a `<Name>.json` file with
//! its creation bytecode and a `<Name>.dbg.json` file pointing at the build-info file that
//! holds the compiler version and the standard-JSON compiler input.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;

/// The contracts this system deploys.
///
/// The string form is both the artifact name and the registry key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
pub enum ContractKind {
    UniswapV2Factory,
    FairSwapRouter,
}

/// A compiled contract, as found in its artifact file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub source_name: String,
    /// Creation bytecode (without constructor arguments).
    pub bytecode: Bytes,
}

impl Artifact {
    /// Fully qualified name, as expected by block explorers: `<source>:<contract>`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }
}

/// Compiler metadata of the build that produced an artifact.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    /// Standard-JSON compiler input.
    pub input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: String,
}

/// Lookup of artifacts below an artifacts directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the artifact file of a contract anywhere below the root.
    fn find(&self, kind: ContractKind) -> Result<PathBuf> {
        let file_name = format!("{}.json", kind.as_ref());

        find_file(&self.root, &file_name)?.with_context(|| {
            format!(
                "Artifact {} not found under {}; compile the contracts first",
                file_name,
                self.root.display()
            )
        })
    }

    /// Load the artifact of a contract.
    pub fn load(&self, kind: ContractKind) -> Result<Artifact> {
        let path = self.find(kind)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let artifact: Artifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        if artifact.bytecode.is_empty() {
            anyhow::bail!("Artifact {} has no bytecode", path.display());
        }

        tracing::debug!(contract = %kind, path = %path.display(), "Loaded artifact");

        Ok(artifact)
    }

    /// Load the build info referenced by a contract's debug file.
    pub fn build_info(&self, kind: ContractKind) -> Result<BuildInfo> {
        let artifact_path = self.find(kind)?;
        let dbg_path = artifact_path.with_extension("dbg.json");

        let content = std::fs::read_to_string(&dbg_path)
            .with_context(|| format!("Failed to read {}", dbg_path.display()))?;
        let dbg: DebugFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", dbg_path.display()))?;

        let parent = dbg_path
            .parent()
            .context("Debug file path must have a parent directory")?;
        let build_info_path = parent.join(dbg.build_info);

        let content = std::fs::read_to_string(&build_info_path)
            .with_context(|| format!("Failed to read {}", build_info_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse build info {}", build_info_path.display()))
    }
}

/// Depth-first search for a file name. Build-info and cache directories are skipped.
fn find_file(dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    let candidate = dir.join(file_name);
    if candidate.is_file() {
        return Ok(Some(candidate));
    }

    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read entry of {}", dir.display()))?
            .path();

        if !path.is_dir() || path.file_name().is_some_and(|name| name == "build-info") {
            continue;
        }

        if let Some(found) = find_file(&path, file_name)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}
