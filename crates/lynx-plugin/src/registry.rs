//! Extension registry: what was loaded and what was skipped at startup.

use std::path::PathBuf;

use serde::Serialize;

use crate::hooks::definitions::HookKind;

/// An extension whose registration completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionRecord {
    /// Extension identifier.
    pub name: String,
    /// Artifact path.
    pub source: PathBuf,
    /// Private working directory.
    pub work_dir: PathBuf,
    /// Hook kinds registered, one entry per callback, in registration order.
    pub hooks: Vec<HookKind>,
}

/// An extension skipped because opening or registering it failed.
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    /// Extension identifier.
    pub name: String,
    /// Artifact path.
    pub source: PathBuf,
    /// One-line failure description.
    pub message: String,
    /// Error chain or panic backtrace.
    pub trace: Option<String>,
}

/// Outcome of the startup load, in load order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    loaded: Vec<ExtensionRecord>,
    failed: Vec<LoadFailure>,
}

impl LoadSummary {
    /// Creates an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_loaded(&mut self, record: ExtensionRecord) {
        self.loaded.push(record);
    }

    pub(crate) fn record_failed(&mut self, failure: LoadFailure) {
        self.failed.push(failure);
    }

    /// Extensions that loaded.
    pub fn loaded(&self) -> &[ExtensionRecord] {
        &self.loaded
    }

    /// Extensions that were skipped.
    pub fn failed(&self) -> &[LoadFailure] {
        &self.failed
    }

    /// Looks up a loaded extension.
    pub fn get(&self, name: &str) -> Option<&ExtensionRecord> {
        self.loaded.iter().find(|r| r.name == name)
    }

    /// Names of the loaded extensions, in load order.
    pub fn names(&self) -> Vec<&str> {
        self.loaded.iter().map(|r| r.name.as_str()).collect()
    }
}
