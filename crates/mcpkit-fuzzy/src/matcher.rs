//! Typo correction, fuzzy matching and query suggestions

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FuzzyConfig;
use crate::dictionary::TypoDictionary;
use crate::phonetic::{levenshtein, metaphone, soundex};
use crate::Result;

const EXACT_SCORE: f64 = 1.0;
const CONTAINS_WEIGHT: f64 = 0.9;
const EDIT_WEIGHT: f64 = 0.8;
const PHONETIC_SCORE: f64 = 0.7;
const PHONETIC_BOOST: f64 = 0.2;

/// How a token was corrected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    /// Token is a dictionary misspelling
    ExactTypo,
    /// Token is one edit away from a dictionary misspelling
    FuzzyTypo,
}

/// One substituted token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    pub method: CorrectionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<usize>,
}

/// Result of [`FuzzyMatcher::correct_typos`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResult {
    pub original: String,
    /// Lower-cased tokens joined by single spaces, with corrections applied
    pub corrected: String,
    pub corrections: Vec<Correction>,
    pub had_corrections: bool,
}

/// Which rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Contains,
    Levenshtein,
    Phonetic,
}

/// A scored haystack term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatch {
    pub term: String,
    pub score: f64,
    pub method: MatchMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<usize>,
}

/// A vocabulary term close to one query word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub term: String,
    pub distance: usize,
    pub confidence: f64,
}

/// A whole-query alternative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySuggestion {
    pub query: String,
    pub confidence: f64,
    /// Original word -> replacement
    pub changed_words: BTreeMap<String, String>,
}

/// Query-side fuzzy matcher.
///
/// Stateless per call; construct once and share by reference.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    config: FuzzyConfig,
    typos: TypoDictionary,
}

impl FuzzyMatcher {
    /// Create a matcher with the built-in typo dictionary
    pub fn new(config: FuzzyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            typos: TypoDictionary::new(),
        })
    }

    /// Create a matcher whose dictionary also contains `rules`
    pub fn with_typo_rules<I, S>(config: FuzzyConfig, rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        config.validate()?;
        Ok(Self {
            config,
            typos: TypoDictionary::with_rules(rules)?,
        })
    }

    pub fn config(&self) -> &FuzzyConfig {
        &self.config
    }

    pub fn typos(&self) -> &TypoDictionary {
        &self.typos
    }

    /// Correct known typos token by token.
    ///
    /// Dictionary hits are substituted directly; otherwise a token within one
    /// edit of a misspelling takes that misspelling's correction.
    pub fn correct_typos(&self, query: &str) -> CorrectionResult {
        let mut corrections = Vec::new();
        let mut tokens = Vec::new();

        for token in query.split_whitespace() {
            let token = token.to_lowercase();

            if let Some(correction) = self.typos.get(&token) {
                corrections.push(Correction {
                    original: token.clone(),
                    corrected: correction.to_string(),
                    method: CorrectionMethod::ExactTypo,
                    distance: None,
                });
                tokens.push(correction.to_string());
                continue;
            }

            match self.nearest_typo(&token) {
                Some((correction, distance)) => {
                    corrections.push(Correction {
                        original: token,
                        corrected: correction.to_string(),
                        method: CorrectionMethod::FuzzyTypo,
                        distance: Some(distance),
                    });
                    tokens.push(correction.to_string());
                }
                None => tokens.push(token),
            }
        }

        if !corrections.is_empty() {
            debug!(query, corrections = corrections.len(), "Corrected query typos");
        }

        CorrectionResult {
            original: query.to_string(),
            corrected: tokens.join(" "),
            had_corrections: !corrections.is_empty(),
            corrections,
        }
    }

    /// Correction of the closest misspelling within one edit
    fn nearest_typo(&self, token: &str) -> Option<(&str, usize)> {
        if token.chars().count() < self.config.min_word_length || self.typos.is_correction(token) {
            return None;
        }

        let mut best: Option<(&str, usize)> = None;
        for (misspelling, correction) in self.typos.iter() {
            let distance = levenshtein(token, misspelling);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((correction, distance));
            }
        }
        best.filter(|&(_, distance)| distance <= 1)
    }

    /// Score every haystack term against `needle`, best first.
    ///
    /// A term may appear more than once, once per qualifying method; see
    /// [`best_per_term`] to keep only the top entry.
    pub fn fuzzy_match<S: AsRef<str>>(&self, needle: &str, haystack: &[S]) -> Vec<FuzzyMatch> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let needle_len = needle.chars().count();

        let mut matches = Vec::new();
        for term in haystack {
            let term = term.as_ref();
            let lowered = term.to_lowercase();
            if lowered.is_empty() {
                continue;
            }
            let term_len = lowered.chars().count();
            let first = matches.len();

            if lowered == needle {
                matches.push(FuzzyMatch {
                    term: term.to_string(),
                    score: EXACT_SCORE,
                    method: MatchMethod::Exact,
                    distance: Some(0),
                });
            } else if lowered.contains(&needle) {
                matches.push(FuzzyMatch {
                    term: term.to_string(),
                    score: CONTAINS_WEIGHT * (needle_len as f64 / term_len as f64),
                    method: MatchMethod::Contains,
                    distance: None,
                });
            }

            let distance = levenshtein(&needle, &lowered);
            if distance > 0 && distance <= self.config.max_edit_distance {
                let max_len = needle_len.max(term_len) as f64;
                matches.push(FuzzyMatch {
                    term: term.to_string(),
                    score: EDIT_WEIGHT * (1.0 - distance as f64 / max_len),
                    method: MatchMethod::Levenshtein,
                    distance: Some(distance),
                });
            }

            let covered = matches[first..]
                .iter()
                .any(|m| m.score >= PHONETIC_SCORE);
            if !covered && self.is_phonetically_similar(&needle, &lowered) {
                matches.push(FuzzyMatch {
                    term: term.to_string(),
                    score: PHONETIC_SCORE,
                    method: MatchMethod::Phonetic,
                    distance: None,
                });
            }
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches
    }

    /// Vocabulary terms within the edit limit of `word`, best first
    pub fn suggest_word<S: AsRef<str>>(&self, word: &str, vocabulary: &[S]) -> Vec<Suggestion> {
        let word = word.to_lowercase();
        let word_len = word.chars().count();
        if word_len < self.config.min_word_length {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut suggestions: Vec<Suggestion> = vocabulary
            .iter()
            .map(|term| term.as_ref().trim().to_lowercase())
            .filter(|term| !term.is_empty() && *term != word && seen.insert(term.clone()))
            .filter_map(|term| {
                let distance = levenshtein(&word, &term);
                if distance > self.config.max_edit_distance {
                    return None;
                }
                let max_len = word_len.max(term.chars().count()) as f64;
                let confidence = (1.0 - distance as f64 / max_len) + self.phonetic_boost(&word, &term);
                Some(Suggestion {
                    term,
                    distance,
                    confidence: confidence.min(1.0),
                })
            })
            .collect();

        suggestions.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.distance.cmp(&b.distance))
                .then_with(|| a.term.cmp(&b.term))
        });
        suggestions.truncate(self.config.suggestion_count);
        suggestions
    }

    /// Alternative queries that each replace one word with a close
    /// vocabulary term. Query strings are unique.
    pub fn generate_suggestions<S: AsRef<str>>(
        &self,
        query: &str,
        vocabulary: &[S],
    ) -> Vec<QuerySuggestion> {
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if words.is_empty() || vocabulary.is_empty() {
            return Vec::new();
        }

        let mut by_query: HashMap<String, QuerySuggestion> = HashMap::new();
        for (position, word) in words.iter().enumerate() {
            for suggestion in self.suggest_word(word, vocabulary) {
                let candidate = words
                    .iter()
                    .enumerate()
                    .map(|(i, w)| if i == position { suggestion.term.as_str() } else { w.as_str() })
                    .collect::<Vec<_>>()
                    .join(" ");

                let keep = by_query
                    .get(&candidate)
                    .map_or(true, |existing| suggestion.confidence > existing.confidence);
                if keep {
                    by_query.insert(
                        candidate.clone(),
                        QuerySuggestion {
                            query: candidate,
                            confidence: suggestion.confidence,
                            changed_words: BTreeMap::from([(word.clone(), suggestion.term)]),
                        },
                    );
                }
            }
        }

        let mut suggestions: Vec<_> = by_query.into_values().collect();
        suggestions.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.query.cmp(&b.query))
        });
        suggestions.truncate(self.config.suggestion_count);

        debug!(query, suggestions = suggestions.len(), "Generated query suggestions");
        suggestions
    }

    /// Soundex-equal or Metaphone-equal, as enabled
    pub fn is_phonetically_similar(&self, a: &str, b: &str) -> bool {
        if !self.config.enable_phonetic {
            return false;
        }
        (self.config.enable_soundex && codes_equal(soundex(a), soundex(b)))
            || (self.config.enable_metaphone && codes_equal(metaphone(a), metaphone(b)))
    }

    fn phonetic_boost(&self, a: &str, b: &str) -> f64 {
        if !self.config.enable_phonetic {
            return 0.0;
        }
        let mut boost = 0.0;
        if self.config.enable_soundex && codes_equal(soundex(a), soundex(b)) {
            boost += PHONETIC_BOOST;
        }
        if self.config.enable_metaphone && codes_equal(metaphone(a), metaphone(b)) {
            boost += PHONETIC_BOOST;
        }
        boost
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            config: FuzzyConfig::default(),
            typos: TypoDictionary::new(),
        }
    }
}

fn codes_equal(a: String, b: String) -> bool {
    !a.is_empty() && a == b
}

/// Keep the highest-scoring entry per term, preserving order
pub fn best_per_term(matches: Vec<FuzzyMatch>) -> Vec<FuzzyMatch> {
    let mut best: Vec<FuzzyMatch> = Vec::with_capacity(matches.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for m in matches {
        match index.get(&m.term) {
            Some(&i) if best[i].score >= m.score => {}
            Some(&i) => best[i] = m,
            None => {
                index.insert(m.term.clone(), best.len());
                best.push(m);
            }
        }
    }
    best
}
