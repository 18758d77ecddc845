//! # Mathematical Functions
//!
//! Checked integer arithmetic and 18-digit fixed-point helpers.

pub mod fixed_point;
pub mod safe_math;

// Re-export commonly used functions
pub use fixed_point::*;
pub use safe_math::*;
