//! Configuration module
//!
//! Contains the pipeline configuration loaded by the demo binary.

mod pipeline_config;

pub use pipeline_config::*;
