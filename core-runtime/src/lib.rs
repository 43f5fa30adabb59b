//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the SSO console core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the session core depends on.
//! It establishes the logging conventions, the configuration surface, and the
//! event broadcasting mechanism used to observe session transitions.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
