//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the renderer:
//! - Math types and operations
//! - Process-wide id allocation
//! - Logging utilities

pub mod math;
pub mod ids;
pub mod logging;
