//! Sample Lynx extension.
//!
//! Counts visits per request path in the shared cache, stamps every
//! response with its origin and a body digest, and echoes WebSocket
//! messages back to the sender. Linked into the server as a built-in and
//! also buildable as a `.wsp` shared library.

pub mod hooks;

use lynx_plugin::prelude::*;

/// Name the extension registers under.
pub const NAME: &str = "visit-counter";

/// Registration entry point.
pub fn register(ctx: &mut ExtensionContext) -> anyhow::Result<()> {
    let cache = ctx.cache().clone();
    let toolkit = ctx.toolkit().clone();
    let served_by = format!("lynx/{}", ctx.name());

    ctx.hooks()
        .before_request(move |req| hooks::count_visit(&cache, req))
        .after_request(move |_, resp| {
            resp.set_header(hooks::SERVED_BY_HEADER, served_by.as_str());
            hooks::stamp_digest(&toolkit, resp);
            Ok(())
        })
        .websocket_connect(hooks::greet)
        .websocket_message(hooks::echo)
        .websocket_close(hooks::farewell);

    tracing::info!(
        extension = %ctx.name(),
        work_dir = %ctx.work_dir().display(),
        "Visit counter registered"
    );
    Ok(())
}

lynx_plugin::export_extension!(register);
