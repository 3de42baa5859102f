//! Core types for the sigcan transmission pipeline.
//!
//! This module provides the configuration model and the crate-wide error type.

pub mod config;
pub mod error;

pub use config::*;
pub use error::{Result, SenderError};
