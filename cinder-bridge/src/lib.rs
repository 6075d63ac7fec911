//! Cinder Bridge library target.
//!
//! Exposes the console view's modules for integration tests. The binary
//! entry point is in `main.rs`.

pub mod app;
pub mod config;
pub mod editor;
pub mod keyboard;
pub mod renderer;
