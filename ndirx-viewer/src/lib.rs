//! # ndirx-viewer — headless NDI receiver
//!
//! Polls one named source through the `ndirx-core` pipeline at a fixed
//! tick rate and reports what it receives through `tracing`. With the
//! default `mock` backend it streams a built-in test pattern, so it runs
//! on machines without the NDI runtime.

pub mod config;
pub mod renderer;
pub mod runner;
