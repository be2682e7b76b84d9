//! gifify - video and image-sequence to GIF converter
//!
//! This library crate exposes the configuration and HTTP server for the
//! binary and for integration testing. Conversion itself lives in
//! `gifify-core` and `gifify-av`.

pub mod config;
pub mod server;
