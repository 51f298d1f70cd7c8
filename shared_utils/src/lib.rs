//! Small helpers shared by the pipeline crates.

pub mod config;
pub mod env;
