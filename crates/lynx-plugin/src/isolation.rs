//! Failure isolation for extension code.
//!
//! Every call into an extension, whether registration at load time or a
//! hook callback at dispatch time, goes through [`isolate`]. Returned errors
//! and panics both come back as a [`Failure`] carrying a diagnostic trace;
//! nothing unwinds into the server.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

thread_local! {
    /// Number of `isolate` frames active on this thread.
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Location and backtrace of the last panic caught on this thread.
    static LAST_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// A failed call into extension code.
#[derive(Debug, Clone)]
pub struct Failure {
    /// One-line description.
    pub message: String,
    /// Error chain or panic backtrace.
    pub trace: Option<String>,
    /// Whether the extension panicked rather than returning an error.
    pub panicked: bool,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.panicked {
            write!(f, "panicked: {}", self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

/// Runs `f`, converting an `Err` or a panic into a [`Failure`].
pub fn isolate<T>(f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, Failure> {
    install_panic_hook();

    DEPTH.with(|d| d.set(d.get() + 1));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    DEPTH.with(|d| d.set(d.get() - 1));

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Failure {
            message: format!("{err:#}"),
            trace: Some(format!("{err:?}")),
            panicked: false,
        }),
        Err(payload) => Err(Failure {
            message: panic_message(payload.as_ref()),
            trace: LAST_PANIC.with(|slot| slot.borrow_mut().take()),
            panicked: true,
        }),
    }
}

/// Installs a process-wide panic hook once. Panics raised inside `isolate`
/// are recorded for the caught [`Failure`] instead of printed; all other
/// panics go to the previously installed hook.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if DEPTH.with(|d| d.get()) == 0 {
                previous(info);
                return;
            }
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            let report = format!("at {location}\n{}", Backtrace::force_capture());
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(report));
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
