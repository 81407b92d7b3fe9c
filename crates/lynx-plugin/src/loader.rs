//! Extension discovery and artifact opening.
//!
//! Discovery lists the artifacts in one directory. An [`ArtifactOpener`]
//! turns an artifact into runnable registration logic: [`BuiltinCatalog`]
//! for extensions linked into the binary, [`DynamicOpener`] for shared
//! libraries (feature `dynamic`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ExtensionError;
use crate::traits::Extension;

/// A discovered extension artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionArtifact {
    /// Identifier: the file name without the suffix.
    pub name: String,
    /// Artifact path.
    pub path: PathBuf,
}

/// Lists the artifacts in `dir` whose file name ends in `.{suffix}`, sorted
/// by file name.
///
/// A missing directory is created and yields no artifacts. Entries that are
/// not regular files, or whose names are not UTF-8, are skipped.
pub fn discover(dir: &Path, suffix: &str) -> Result<Vec<ExtensionArtifact>, ExtensionError> {
    let scan_err = |source| ExtensionError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(scan_err)?;

    let extension = format!(".{suffix}");
    let mut found = BTreeMap::new();

    for entry in std::fs::read_dir(dir).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(path = %path.display(), "Skipping artifact with non UTF-8 name");
            continue;
        };
        let Some(name) = file_name.strip_suffix(&extension) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let artifact = ExtensionArtifact {
            name: name.to_string(),
            path,
        };
        found.insert(file_name, artifact);
    }

    debug!(dir = %dir.display(), count = found.len(), "Extension artifacts discovered");
    Ok(found.into_values().collect())
}

/// Resolves an artifact into registration logic.
pub trait ArtifactOpener: Send + Sync {
    /// Opens `artifact`. Called inside failure isolation.
    fn open(&self, artifact: &ExtensionArtifact) -> Result<Arc<dyn Extension>, ExtensionError>;
}

/// Extensions compiled into the server, keyed by identifier.
///
/// Placing `<name>.<suffix>` in the discovery directory enables the built-in
/// extension `name`. Unknown identifiers go to the fallback opener, if any.
#[derive(Default)]
pub struct BuiltinCatalog {
    entries: BTreeMap<String, Arc<dyn Extension>>,
    fallback: Option<Box<dyn ArtifactOpener>>,
}

impl std::fmt::Debug for BuiltinCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinCatalog")
            .field("entries", &self.names())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl BuiltinCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a built-in extension.
    pub fn with(mut self, name: &str, extension: impl Extension + 'static) -> Self {
        self.insert(name, extension);
        self
    }

    /// Adds a built-in extension.
    pub fn insert(&mut self, name: &str, extension: impl Extension + 'static) {
        self.entries.insert(name.to_string(), Arc::new(extension));
    }

    /// Opener consulted for identifiers not in the catalog.
    pub fn with_fallback(mut self, fallback: impl ArtifactOpener + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Built-in identifiers.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl ArtifactOpener for BuiltinCatalog {
    fn open(&self, artifact: &ExtensionArtifact) -> Result<Arc<dyn Extension>, ExtensionError> {
        if let Some(extension) = self.entries.get(&artifact.name) {
            return Ok(Arc::clone(extension));
        }
        match &self.fallback {
            Some(fallback) => fallback.open(artifact),
            None => Err(ExtensionError::UnknownExtension {
                name: artifact.name.clone(),
            }),
        }
    }
}

/// Shared-library opener.
#[cfg(feature = "dynamic")]
pub mod dynamic_loader {
    use std::sync::Arc;

    use tracing::info;

    use super::{ArtifactOpener, ExtensionArtifact};
    use crate::api::context::ExtensionContext;
    use crate::error::ExtensionError;
    use crate::ffi::abi::{REGISTER_SYMBOL, REGISTER_SYMBOL_BYTES, RegisterFn};
    use crate::traits::Extension;

    /// Opens artifacts as shared libraries exporting the registration entry
    /// point. Loaded libraries stay mapped until the process exits.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct DynamicOpener;

    impl DynamicOpener {
        /// Creates a dynamic opener.
        pub fn new() -> Self {
            Self
        }
    }

    struct SharedLibraryExtension {
        entry: RegisterFn,
    }

    impl Extension for SharedLibraryExtension {
        fn register(&self, ctx: &mut ExtensionContext) -> anyhow::Result<()> {
            // SAFETY: `entry` was exported by `export_extension!` with this
            // exact signature, and its library is never unloaded.
            unsafe { (self.entry)(ctx) }
        }
    }

    impl ArtifactOpener for DynamicOpener {
        fn open(&self, artifact: &ExtensionArtifact) -> Result<Arc<dyn Extension>, ExtensionError> {
            // dlopen treats a bare file name as a search term; hand it a path.
            let path = std::fs::canonicalize(&artifact.path).unwrap_or_else(|_| artifact.path.clone());

            // SAFETY: loading runs the library's initializers. Only trusted
            // artifacts belong in the discovery directory.
            let library = unsafe { libloading::Library::new(&path) }.map_err(|e| {
                ExtensionError::Library {
                    path: path.clone(),
                    message: e.to_string(),
                }
            })?;
            let library: &'static libloading::Library = Box::leak(Box::new(library));

            // SAFETY: the symbol type matches what `export_extension!` emits.
            let entry = unsafe { library.get::<RegisterFn>(REGISTER_SYMBOL_BYTES) }
                .map(|symbol| *symbol)
                .map_err(|_| ExtensionError::MissingSymbol {
                    path: path.clone(),
                    symbol: REGISTER_SYMBOL.to_string(),
                })?;

            info!(extension = %artifact.name, path = %path.display(), "Shared library loaded");
            Ok(Arc::new(SharedLibraryExtension { entry }))
        }
    }
}

/// Stand-in used when the crate is built without `dynamic`.
#[cfg(not(feature = "dynamic"))]
pub mod dynamic_loader {
    use std::sync::Arc;

    use super::{ArtifactOpener, ExtensionArtifact};
    use crate::error::ExtensionError;
    use crate::traits::Extension;

    /// Rejects every artifact: shared-library support is compiled out.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct DynamicOpener;

    impl DynamicOpener {
        /// Creates the stand-in opener.
        pub fn new() -> Self {
            Self
        }
    }

    impl ArtifactOpener for DynamicOpener {
        fn open(&self, artifact: &ExtensionArtifact) -> Result<Arc<dyn Extension>, ExtensionError> {
            Err(ExtensionError::Library {
                path: artifact.path.clone(),
                message: "built without shared-library support".to_string(),
            })
        }
    }
}

pub use dynamic_loader::DynamicOpener;
