//! Integration tests for the assembled Lynx server.

mod helpers;
mod server_test;
