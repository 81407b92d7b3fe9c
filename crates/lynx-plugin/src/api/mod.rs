//! Extension API: the context, shared toolkit and injector exposed to
//! extension code.

pub mod context;
pub mod injector;
pub mod toolkit;

pub use context::{ExtensionContext, ExtensionIdentity};
pub use injector::CapabilityInjector;
pub use toolkit::Toolkit;
