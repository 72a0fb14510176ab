//! ARI dialog-lifecycle demultiplexer — library crate.
//!
//! Binary entry point lives in `main.rs`; this split exists so integration
//! tests (`tests/`) can exercise the Classifier, Registry, and Dialog
//! Instance against the in-memory bus driver without a `[[bin]]` target.

pub mod bus;
pub mod classifier;
pub mod command_bridge;
pub mod config;
pub mod dialog;
pub mod error;
pub mod logger;
pub mod model;
pub mod registry;
pub mod rest;
pub mod runtime;
pub mod supervisor;
pub mod ws;
