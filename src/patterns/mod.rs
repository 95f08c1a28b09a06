//! Known failure patterns: matching candidates against them and learning new ones

pub mod catalog;
pub mod learner;
pub mod matcher;
pub mod store;
pub mod types;

pub use catalog::static_patterns;
pub use learner::FailureLearner;
pub use matcher::{PatternMatcher, match_patterns};
pub use store::{JsonFileStore, MemoryStore, PatternStore};
pub use types::{FailurePattern, LearnOutcome, LearnedFailureCase, PatternMatch, PatternOrigin};
