//! # Core Type Definitions
//!
//! Identifiers and the pooled-balance state shared by every engine module.

pub mod account;
pub mod pool;

// Re-export all types
pub use account::*;
pub use pool::*;
