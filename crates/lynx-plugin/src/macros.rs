//! Convenience macros for extension development.

/// Exports a registration function as the shared-library entry point.
///
/// The function must have the signature
/// `fn(&mut ExtensionContext) -> anyhow::Result<()>`. Build the extension
/// crate as a `cdylib`, rename the library to `<name>.wsp` and drop it in
/// the discovery directory.
///
/// # Example
/// ```rust,ignore
/// use lynx_plugin::prelude::*;
///
/// fn register(ctx: &mut ExtensionContext) -> anyhow::Result<()> {
///     ctx.hooks().before_request(|req| {
///         req.set_header("X-Hello", "world");
///         Ok(())
///     });
///     Ok(())
/// }
///
/// lynx_plugin::export_extension!(register);
/// ```
#[macro_export]
macro_rules! export_extension {
    ($register:path) => {
        #[doc(hidden)]
        #[unsafe(no_mangle)]
        pub extern "Rust" fn lynx_extension_register(
            ctx: &mut $crate::api::context::ExtensionContext,
        ) -> $crate::anyhow::Result<()> {
            $register(ctx)
        }
    };
}
