//! Utility functions shared across the crate.

pub mod format;

pub use format::*;
