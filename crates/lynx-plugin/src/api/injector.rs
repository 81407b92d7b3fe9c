//! Capability injector: builds one [`ExtensionContext`] per artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use lynx_cache::CacheStore;

use super::context::{ExtensionContext, ExtensionIdentity};
use super::toolkit::Toolkit;
use crate::error::ExtensionError;
use crate::loader::ExtensionArtifact;

/// Holds the shared capabilities and hands each extension its own context.
#[derive(Debug, Clone)]
pub struct CapabilityInjector {
    cache: Arc<CacheStore>,
    toolkit: Arc<Toolkit>,
    plugin_root: PathBuf,
}

impl CapabilityInjector {
    /// Creates an injector. Working directories go under `plugin_root`.
    pub fn new(cache: Arc<CacheStore>, toolkit: Arc<Toolkit>, plugin_root: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            toolkit,
            plugin_root: plugin_root.into(),
        }
    }

    /// The shared cache store.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// The shared toolkit.
    pub fn toolkit(&self) -> &Arc<Toolkit> {
        &self.toolkit
    }

    /// Root under which working directories are created.
    pub fn plugin_root(&self) -> &Path {
        &self.plugin_root
    }

    /// Builds the context for `artifact`, creating `<root>/<name>/` if absent.
    pub fn prepare(&self, artifact: &ExtensionArtifact) -> Result<ExtensionContext, ExtensionError> {
        let work_dir = self.plugin_root.join(&artifact.name);
        std::fs::create_dir_all(&work_dir).map_err(|source| ExtensionError::WorkDir {
            path: work_dir.clone(),
            source,
        })?;
        debug!(extension = %artifact.name, work_dir = %work_dir.display(), "Working directory ready");

        let identity = ExtensionIdentity {
            name: artifact.name.clone(),
            source: artifact.path.clone(),
            work_dir,
        };
        Ok(ExtensionContext::new(
            identity,
            Arc::clone(&self.cache),
            Arc::clone(&self.toolkit),
        ))
    }
}
