//! Extension manager: runs the startup load and hands out the dispatcher.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use lynx_cache::CacheStore;

use crate::api::injector::CapabilityInjector;
use crate::error::ExtensionError;
use crate::hooks::dispatcher::HookDispatcher;
use crate::hooks::registry::HookRegistry;
use crate::isolation::{Failure, isolate};
use crate::loader::{ArtifactOpener, ExtensionArtifact, discover};
use crate::registry::{ExtensionRecord, LoadFailure, LoadSummary};

/// Loads every extension once at startup and owns the resulting registry.
///
/// Loading is single-threaded. Once a dispatcher has been handed out the
/// registry is shared and further loads copy it first, so dispatchers never
/// observe a change.
pub struct ExtensionManager {
    injector: CapabilityInjector,
    opener: Box<dyn ArtifactOpener>,
    hooks: Arc<HookRegistry>,
    summary: LoadSummary,
}

impl std::fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionManager")
            .field("injector", &self.injector)
            .field("summary", &self.summary)
            .finish()
    }
}

impl ExtensionManager {
    /// Creates a manager with an empty registry.
    pub fn new(injector: CapabilityInjector, opener: impl ArtifactOpener + 'static) -> Self {
        Self {
            injector,
            opener: Box::new(opener),
            hooks: Arc::new(HookRegistry::new()),
            summary: LoadSummary::new(),
        }
    }

    /// Discovers the artifacts in `dir` and loads them in file-name order.
    ///
    /// Fails only if the directory cannot be created or listed. A failing
    /// extension is logged, recorded in [`failures`](Self::failures) and
    /// skipped.
    pub fn load_all(&mut self, dir: &Path, suffix: &str) -> Result<&LoadSummary, ExtensionError> {
        let artifacts = discover(dir, suffix)?;
        info!(dir = %dir.display(), count = artifacts.len(), "Loading extensions");
        Ok(self.load_artifacts(artifacts))
    }

    /// Loads `artifacts` in the order given.
    pub fn load_artifacts(&mut self, artifacts: Vec<ExtensionArtifact>) -> &LoadSummary {
        for artifact in artifacts {
            match self.load_one(&artifact) {
                Ok(record) => {
                    info!(
                        extension = %record.name,
                        hooks = record.hooks.len(),
                        work_dir = %record.work_dir.display(),
                        "Extension loaded"
                    );
                    self.summary.record_loaded(record);
                }
                Err(failure) => {
                    error!(
                        extension = %artifact.name,
                        source = %artifact.path.display(),
                        error = %failure,
                        trace = failure.trace.as_deref().unwrap_or(""),
                        "Extension failed to load, skipping"
                    );
                    self.summary.record_failed(LoadFailure {
                        name: artifact.name.clone(),
                        source: artifact.path.clone(),
                        message: failure.to_string(),
                        trace: failure.trace,
                    });
                }
            }
        }

        info!(
            loaded = self.summary.loaded().len(),
            failed = self.summary.failed().len(),
            "Extension load complete"
        );
        &self.summary
    }

    fn load_one(&mut self, artifact: &ExtensionArtifact) -> Result<ExtensionRecord, Failure> {
        let mut ctx = self.injector.prepare(artifact).map_err(setup_failure)?;

        let extension = isolate(|| Ok(self.opener.open(artifact)?))?;
        isolate(|| extension.register(&mut ctx))?;

        let identity = ctx.identity().clone();
        let hooks = Arc::make_mut(&mut self.hooks).commit(ctx.into_registrar());

        Ok(ExtensionRecord {
            name: identity.name,
            source: identity.source,
            work_dir: identity.work_dir,
            hooks,
        })
    }

    /// Extensions that loaded, in load order.
    pub fn extensions(&self) -> &[ExtensionRecord] {
        self.summary.loaded()
    }

    /// Extensions that were skipped.
    pub fn failures(&self) -> &[LoadFailure] {
        self.summary.failed()
    }

    /// The whole load outcome.
    pub fn summary(&self) -> &LoadSummary {
        &self.summary
    }

    /// The hook registry built so far.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// A dispatcher over the current registry.
    pub fn dispatcher(&self) -> HookDispatcher {
        HookDispatcher::new(Arc::clone(&self.hooks))
    }

    /// The shared cache store.
    pub fn cache(&self) -> &Arc<CacheStore> {
        self.injector.cache()
    }
}

fn setup_failure(err: ExtensionError) -> Failure {
    Failure {
        message: err.to_string(),
        trace: None,
        panicked: false,
    }
}
