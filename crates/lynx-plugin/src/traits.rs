//! The trait every extension implements.

use crate::api::context::ExtensionContext;

/// Registration logic of an extension.
///
/// `register` runs exactly once, at startup, with the extension's own
/// context. It typically clones the shared handles it needs and registers
/// hook callbacks through [`ExtensionContext::hooks`]. Returning an error
/// or panicking discards everything it registered.
pub trait Extension: Send + Sync {
    /// Runs the extension's top-level registration logic.
    fn register(&self, ctx: &mut ExtensionContext) -> anyhow::Result<()>;
}

impl<F> Extension for F
where
    F: Fn(&mut ExtensionContext) -> anyhow::Result<()> + Send + Sync,
{
    fn register(&self, ctx: &mut ExtensionContext) -> anyhow::Result<()> {
        self(ctx)
    }
}
