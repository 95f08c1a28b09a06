//! Utility functions shared across the codebase

pub mod text;

// Re-export commonly used utilities
pub use text::{contains_any, first_hit, normalize, truncate_chars, word_set, word_similarity};
