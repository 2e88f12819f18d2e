//! Startup discovery of units from a directory of artifacts.
//!
//! Every regular file carrying the configured extension is one artifact; its
//! file stem is both the registry key and the name resolved against the
//! [`UnitCatalog`]. The scan is non-recursive and always visits every
//! artifact, collecting per-artifact failures in a [`DiscoveryReport`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::UnitCatalog;
use crate::unit::{UnitDescriptor, UnitKind};
use crate::unit_registry::{RegistryError, UnitRegistry};

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to read directory {path:?}: {message}")]
    DirectoryRead { path: PathBuf, message: String },

    #[error("Artifact {artifact:?} does not resolve to exactly one {kind} type for `{stem}`, candidates: {candidates:?}")]
    AmbiguousOrMissingType {
        artifact: PathBuf,
        stem: String,
        kind: UnitKind,
        candidates: Vec<String>,
    },

    #[error("Failed to instantiate {type_name} for artifact {artifact:?}: {message}")]
    InstantiationFailed {
        artifact: PathBuf,
        type_name: String,
        message: String,
    },

    #[error("Failed to register artifact {artifact:?}: {source}")]
    Registration {
        artifact: PathBuf,
        #[source]
        source: RegistryError,
    },
}

impl DiscoveryError {
    /// The artifact this failure belongs to, if it is artifact-scoped.
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            DiscoveryError::DirectoryRead { .. } => None,
            DiscoveryError::AmbiguousOrMissingType { artifact, .. }
            | DiscoveryError::InstantiationFailed { artifact, .. }
            | DiscoveryError::Registration { artifact, .. } => Some(artifact),
        }
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Outcome of one scan.
#[derive(Debug)]
pub struct DiscoveryReport {
    pub kind: UnitKind,
    pub directory: PathBuf,
    /// Names added by this scan.
    pub registered: Vec<String>,
    /// Names that were already present and left as they were.
    pub skipped: Vec<String>,
    pub failures: Vec<DiscoveryError>,
}

impl DiscoveryReport {
    fn new(kind: UnitKind, directory: &Path) -> Self {
        Self {
            kind,
            directory: directory.to_path_buf(),
            registered: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolves artifacts against a catalog and fills a registry.
#[derive(Clone, Debug)]
pub struct UnitLoader {
    catalog: Arc<UnitCatalog>,
    extension: String,
}

impl UnitLoader {
    pub fn new(catalog: Arc<UnitCatalog>, extension: &str) -> Self {
        Self {
            catalog,
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Artifacts in `dir`, sorted by path.
    pub fn artifacts(&self, dir: &Path) -> DiscoveryResult<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| DiscoveryError::DirectoryRead {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut artifacts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DiscoveryError::DirectoryRead {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;
            let path = entry.path();

            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.'));
            if hidden || !path.is_file() {
                continue;
            }
            if path.extension().is_some_and(|ext| ext == self.extension.as_str()) {
                artifacts.push(path);
            }
        }
        artifacts.sort();
        Ok(artifacts)
    }

    /// Scans `dir` and registers one unit per resolvable artifact.
    ///
    /// Names already present in `registry` are skipped without being resolved
    /// again, so repeated scans over unchanged input leave the registry as is.
    #[tracing::instrument(skip(self, registry), fields(kind = %registry.kind()), level = "debug")]
    pub fn discover(&self, dir: &Path, registry: &UnitRegistry) -> DiscoveryResult<DiscoveryReport> {
        let kind = registry.kind();
        let mut report = DiscoveryReport::new(kind, dir);

        for artifact in self.artifacts(dir)? {
            let Some(stem) = artifact.file_stem().and_then(|s| s.to_str()) else {
                warn!(artifact = ?artifact, "Skipping artifact with a non UTF-8 name");
                continue;
            };
            let stem = stem.to_string();

            if registry.contains(&stem) {
                debug!(unit = %stem, "Unit already registered, skipping");
                report.skipped.push(stem);
                continue;
            }

            match self.load_artifact(&artifact, &stem, registry) {
                Ok(()) => report.registered.push(stem),
                Err(e) => {
                    warn!(artifact = ?artifact, error = %e, "Failed to load unit");
                    report.failures.push(e);
                }
            }
        }

        info!(
            kind = %kind,
            directory = ?dir,
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Discovery finished"
        );
        Ok(report)
    }

    fn load_artifact(
        &self,
        artifact: &Path,
        stem: &str,
        registry: &UnitRegistry,
    ) -> DiscoveryResult<()> {
        let kind = registry.kind();
        let candidates = self.catalog.candidates(kind, stem);
        let entry = match candidates.as_slice() {
            [entry] => *entry,
            _ => {
                return Err(DiscoveryError::AmbiguousOrMissingType {
                    artifact: artifact.to_path_buf(),
                    stem: stem.to_string(),
                    kind,
                    candidates: candidates
                        .iter()
                        .map(|entry| entry.type_name().to_string())
                        .collect(),
                });
            }
        };

        let unit = entry
            .instantiate()
            .map_err(|e| DiscoveryError::InstantiationFailed {
                artifact: artifact.to_path_buf(),
                type_name: entry.type_name().to_string(),
                message: e.to_string(),
            })?;

        registry
            .register(UnitDescriptor::new(stem, kind, entry.type_name(), unit))
            .map_err(|source| DiscoveryError::Registration {
                artifact: artifact.to_path_buf(),
                source,
            })
    }
}
