//! Core types for docchat
//!
//! This crate provides the conversation session model, configuration
//! handling, and logging setup shared by the other docchat crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use error::{Error, Result};
