//! Extension context: everything an extension receives while it registers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use lynx_cache::{CacheError, CacheStore};

use super::toolkit::Toolkit;
use crate::hooks::registry::HookRegistrar;

/// Bindings private to one extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionIdentity {
    /// Extension identifier (artifact file stem).
    pub name: String,
    /// Path of the artifact the extension was loaded from.
    pub source: PathBuf,
    /// Private working directory.
    pub work_dir: PathBuf,
}

/// Execution context handed to an extension's registration logic.
///
/// The identity is private to the extension. The cache and the toolkit are
/// the same instances for every extension. Hooks registered through
/// [`hooks`](Self::hooks) are staged until registration succeeds.
pub struct ExtensionContext {
    identity: ExtensionIdentity,
    hooks: HookRegistrar,
    cache: Arc<CacheStore>,
    toolkit: Arc<Toolkit>,
}

impl std::fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("identity", &self.identity)
            .field("staged", &self.hooks.staged())
            .finish()
    }
}

impl ExtensionContext {
    /// Creates a context.
    pub fn new(identity: ExtensionIdentity, cache: Arc<CacheStore>, toolkit: Arc<Toolkit>) -> Self {
        let hooks = HookRegistrar::new(&identity.name);
        Self {
            identity,
            hooks,
            cache,
            toolkit,
        }
    }

    /// The extension's private bindings.
    pub fn identity(&self) -> &ExtensionIdentity {
        &self.identity
    }

    /// Extension identifier.
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Artifact path.
    pub fn source(&self) -> &Path {
        &self.identity.source
    }

    /// Private working directory. Exists by the time registration runs.
    pub fn work_dir(&self) -> &Path {
        &self.identity.work_dir
    }

    /// Hook registration interface.
    pub fn hooks(&mut self) -> &mut HookRegistrar {
        &mut self.hooks
    }

    /// Shared cache store. Clone the `Arc` to use it from callbacks.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Persists the shared cache.
    pub fn save_cache(&self) -> Result<(), CacheError> {
        self.cache.save()
    }

    /// Shared utility capabilities.
    pub fn toolkit(&self) -> &Arc<Toolkit> {
        &self.toolkit
    }

    /// Directory holding external media tools.
    pub fn media_tool_dir(&self) -> &Path {
        self.toolkit.media_tool_dir()
    }

    pub(crate) fn into_registrar(self) -> HookRegistrar {
        self.hooks
    }
}
