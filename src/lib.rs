//! Shutterbox - photo library sync
//!
//! This library crate exposes the binary's configuration loading and the
//! derivative render queue for integration testing. The sync pipeline itself
//! lives in `sb-sync`.

pub mod config;
pub mod render;
