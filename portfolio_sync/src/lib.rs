//! Loads the Vietnamese equities master list, daily quotes, yearly ratios and index
//! levels into a normalized SQLite store.
//!
//! The pieces can be driven one by one (see [`reference`], [`loader`], [`db`]) or
//! as a whole through [`pipeline::Pipeline`].

pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod reference;
pub mod schema;
pub mod stats;

pub use error::{PipelineError, ReferenceError, StoreError};
