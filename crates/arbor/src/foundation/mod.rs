//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the toolkit:
//! - Math types and operations
//! - Deterministic hashing helpers
//! - Logging utilities

pub mod math;
pub mod hash;
pub mod logging;
