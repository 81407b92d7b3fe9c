//! Utility capabilities granted to every extension.
//!
//! One [`Toolkit`] is built at startup and shared by `Arc` with every
//! extension context.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Command;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::ExtensionError;
use crate::isolation::isolate;

/// Shared allowlist of networking, concurrency, encoding, pattern, process
/// and time helpers.
#[derive(Debug)]
pub struct Toolkit {
    http: reqwest::Client,
    runtime: Option<Handle>,
    media_tool_dir: PathBuf,
    patterns: Mutex<HashMap<String, Regex>>,
}

impl Toolkit {
    /// Builds the toolkit, binding the current tokio runtime if there is one.
    pub fn new(media_tool_dir: impl Into<PathBuf>) -> Result<Self, ExtensionError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lynx/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            runtime: Handle::try_current().ok(),
            media_tool_dir: media_tool_dir.into(),
            patterns: Mutex::new(HashMap::new()),
        })
    }

    /// Binds an explicit runtime handle.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    // -- networking / concurrency --

    /// Shared HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The bound runtime, if any.
    pub fn runtime(&self) -> Option<&Handle> {
        self.runtime.as_ref()
    }

    /// Drives `future` to completion from a synchronous callback.
    ///
    /// Callbacks run on the blocking pool, where blocking on the runtime is
    /// allowed.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, ExtensionError> {
        let runtime = self.runtime.as_ref().ok_or(ExtensionError::NoRuntime)?;
        Ok(runtime.block_on(future))
    }

    /// Runs `task` in the background. Failures are logged, never propagated.
    pub fn spawn<F>(&self, name: &str, task: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let name = name.to_string();
        let job = move || {
            if let Err(failure) = isolate(task) {
                warn!(
                    task = %name,
                    error = %failure,
                    trace = failure.trace.as_deref().unwrap_or(""),
                    "Background task failed"
                );
            }
        };

        match &self.runtime {
            Some(runtime) => {
                runtime.spawn_blocking(job);
            }
            None => {
                std::thread::spawn(job);
            }
        }
    }

    // -- hashing / encoding --

    /// Lower-case hex SHA-256 digest.
    pub fn sha256_hex(&self, data: impl AsRef<[u8]>) -> String {
        format!("{:x}", Sha256::digest(data.as_ref()))
    }

    /// Standard base64 with padding.
    pub fn base64_encode(&self, data: impl AsRef<[u8]>) -> String {
        STANDARD.encode(data)
    }

    /// Decodes standard base64.
    pub fn base64_decode(&self, data: &str) -> Result<Vec<u8>, ExtensionError> {
        Ok(STANDARD.decode(data)?)
    }

    /// Decodes a form-encoded component: `+` is a space, then percent escapes.
    /// Invalid UTF-8 is replaced.
    pub fn url_decode(&self, input: &str) -> String {
        url_decode(input)
    }

    /// Parses a query string or form body into ordered key → values.
    /// Pairs with an empty value are dropped.
    pub fn parse_query(&self, input: &str) -> BTreeMap<String, Vec<String>> {
        parse_query(input)
    }

    // -- text patterns --

    /// Compiles `pattern`, reusing an earlier compilation of the same string.
    pub fn regex(&self, pattern: &str) -> Result<Regex, ExtensionError> {
        let mut patterns = self.patterns.lock();
        if let Some(re) = patterns.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern)?;
        debug!(pattern, "Compiled pattern");
        patterns.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    // -- processes --

    /// A process builder for `program`.
    pub fn command(&self, program: impl AsRef<std::ffi::OsStr>) -> Command {
        Command::new(program)
    }

    /// Directory holding external media tools.
    pub fn media_tool_dir(&self) -> &Path {
        &self.media_tool_dir
    }

    /// Path of tool `name` inside the media tool directory.
    pub fn media_tool(&self, name: &str) -> PathBuf {
        self.media_tool_dir
            .join(format!("{name}{}", std::env::consts::EXE_SUFFIX))
    }

    /// A process builder for tool `name` inside the media tool directory.
    pub fn media_tool_command(&self, name: &str) -> Command {
        Command::new(self.media_tool(name))
    }

    // -- time --

    /// Current UTC time.
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Seconds since the Unix epoch.
    pub fn unix_timestamp(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Form-style percent decoding, shared with the transport.
pub fn url_decode(input: &str) -> String {
    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Query string parsing, shared with the transport.
pub fn parse_query(input: &str) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in input.split(['&', ';']).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if value.is_empty() {
            continue;
        }
        out.entry(url_decode(key))
            .or_default()
            .push(url_decode(value));
    }
    out
}
