//! Extension system configuration.

use serde::{Deserialize, Serialize};

/// Extension discovery and capability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Directory scanned for extension artifacts.
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Root under which each extension gets `<root>/<name>/` as its
    /// private working directory.
    #[serde(default = "default_root")]
    pub root: String,
    /// File suffix (without the dot) identifying an extension artifact.
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// External media-tool directory handed to every extension.
    #[serde(default = "default_media_tool_dir")]
    pub media_tool_dir: String,
    /// Whether to load extensions on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            root: default_root(),
            suffix: default_suffix(),
            media_tool_dir: default_media_tool_dir(),
            auto_load: true,
        }
    }
}

fn default_directory() -> String {
    "plugins/wsp".to_string()
}

fn default_root() -> String {
    "plugins".to_string()
}

fn default_suffix() -> String {
    "wsp".to_string()
}

fn default_media_tool_dir() -> String {
    "ffmpeg".to_string()
}

fn default_true() -> bool {
    true
}
