//! Command-line driver for the gallerysync listener manager.
//!
//! Runs a scripted lifecycle against the in-memory store and prints the
//! resulting counters.

pub mod args;
pub mod demo;

pub use args::Args;
pub use demo::{run, seed, DemoReport};
