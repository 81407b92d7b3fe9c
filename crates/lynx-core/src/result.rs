//! Convenience result type alias for Lynx.

use crate::error::AppError;

/// A specialized `Result` type for Lynx operations.
pub type AppResult<T> = Result<T, AppError>;
