//! # VAP Common Library
//!
//! Shared code for the Vision Attend services:
//! - Domain models (students, sessions, attendance records, unknown faces)
//! - SQLite pool and schema initialization
//! - TOML bootstrap configuration
//! - Time helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
