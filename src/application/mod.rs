//! Stylesheet compilation: discovery, freshness, minification and responses.

pub mod compiler;
pub mod error;
pub mod minify;
pub mod response;
pub mod sources;

pub use compiler::{CacheCompiler, CacheOutcome, CompileReport, CompiledStylesheet, compile};
pub use response::{CACHE_LIFETIME, StyleResponse, etag_for};
