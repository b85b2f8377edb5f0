// Library exports for Quill
// This allows integration tests and the binary to share the service modules

pub mod blog;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
