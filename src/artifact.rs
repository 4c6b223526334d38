//! The artifact directory holding one published schema file per spec.
//!
//! Files are written to a temporary name inside the directory and renamed into place, so a
//! concurrent reader (the static file middleware) sees either the previous content or the
//! new content, never a partial write.

use crate::error::{Error, Result};
use crate::schema::SchemaDocument;
use log::{debug, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory name of the artifact store inside the dependency cache.
pub const ARTIFACT_DIR_NAME: &str = "umi_open_api";

/// Prefix of every published artifact file name.
pub const ARTIFACT_FILE_PREFIX: &str = "umi-plugins_";

/// Name of the file a spec's schema is published to.
pub fn artifact_file_name(name: &str) -> String {
    format!("{}{}.json", ARTIFACT_FILE_PREFIX, name)
}

/// URL path the static middleware serves a spec's artifact under.
pub fn artifact_url(name: &str) -> String {
    format!("/{}", artifact_file_name(name))
}

/// What happened when the artifact directory was reset.
///
/// A failed reset is not an error: the store keeps working with whatever is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// No directory existed; a fresh one was created.
    Created,
    /// An existing directory was deleted and recreated empty.
    Recreated,
    /// Removal or creation failed; the directory may be stale or missing.
    Failed { reason: String },
}

impl ResetOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ResetOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's conventional location inside a dependency cache directory.
    pub fn in_dependency_cache(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join(ARTIFACT_DIR_NAME))
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact published under `name`.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.root.join(artifact_file_name(name))
    }

    /// Deletes the whole directory and recreates it empty. Never fails.
    pub fn reset(&self) -> ResetOutcome {
        let existed = self.root.exists();
        if existed {
            if let Err(e) = fs::remove_dir_all(&self.root) {
                let reason = format!("cannot remove {}: {}", self.root.display(), e);
                warn!("Artifact directory reset skipped: {}", reason);
                return ResetOutcome::Failed { reason };
            }
        }

        if let Err(e) = fs::create_dir_all(&self.root) {
            let reason = format!("cannot create {}: {}", self.root.display(), e);
            warn!("Artifact directory reset skipped: {}", reason);
            return ResetOutcome::Failed { reason };
        }

        debug!("Artifact directory ready at {}", self.root.display());
        if existed {
            ResetOutcome::Recreated
        } else {
            ResetOutcome::Created
        }
    }

    /// Serializes `document` as pretty-printed JSON and publishes it under `name`.
    pub fn publish(&self, name: &str, document: &SchemaDocument) -> Result<PathBuf> {
        let content = document.to_pretty_json()?;
        self.publish_bytes(name, content.as_bytes())
    }

    /// Atomically writes `content` as the artifact for `name`, replacing any previous one.
    pub fn publish_bytes(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(Error::configuration(
                name,
                "display name cannot be used as an artifact file name",
            ));
        }

        fs::create_dir_all(&self.root)?;
        let target = self.artifact_path(name);

        let mut staged = tempfile::Builder::new()
            .prefix(".publish-")
            .suffix(".tmp")
            .tempfile_in(&self.root)?;
        staged.write_all(content)?;
        staged.as_file().sync_all()?;
        staged.persist(&target).map_err(|e| Error::Io(e.error))?;

        debug!("Published {} bytes to {}", content.len(), target.display());
        Ok(target)
    }

    /// Reads the artifact published under `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.artifact_path(name))?)
    }

    /// Published artifact files, sorted by path.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::other(format!("cannot list artifacts: {}", e)))
            })?;
            let is_artifact = {
                let file_name = entry.file_name().to_string_lossy();
                file_name.starts_with(ARTIFACT_FILE_PREFIX) && file_name.ends_with(".json")
            };
            if entry.file_type().is_file() && is_artifact {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}
