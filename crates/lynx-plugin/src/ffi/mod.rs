//! Shared-library boundary for dynamically loaded extensions.

pub mod abi;
