//! # mcpkit Fuzzy
//!
//! Query-side typo correction and fuzzy matching for code search.
//!
//! - Curated programming-typo dictionary with exact and one-edit lookup
//! - Scored matching by exact, substring, edit distance and phonetic rules
//! - Whole-query suggestions built from a caller-supplied vocabulary
//! - Soundex and Metaphone codes

pub mod config;
pub mod dictionary;
pub mod error;
pub mod matcher;
pub mod phonetic;

pub use config::FuzzyConfig;
pub use dictionary::TypoDictionary;
pub use error::{FuzzyError, Result};
pub use matcher::{
    best_per_term, Correction, CorrectionMethod, CorrectionResult, FuzzyMatch, FuzzyMatcher,
    MatchMethod, QuerySuggestion, Suggestion,
};
pub use phonetic::{levenshtein, metaphone, soundex};
