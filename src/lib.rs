//! Concatenate, minify and serve a directory of stylesheets.
//!
//! The compiler keeps a single `style.cache` artifact next to the sources and
//! answers HTTP requests with `ETag`/`Last-Modified` validators.

pub mod application;
pub mod config;
pub mod infra;
