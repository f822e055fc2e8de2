//! Curated typo dictionary for programming search terms

use std::collections::{HashMap, HashSet};

use crate::{FuzzyError, Result};

/// Common misspellings seen in code search queries
const PROGRAMMING_TYPOS: &[(&str, &str)] = &[
    ("fucntion", "function"),
    ("funtion", "function"),
    ("fuction", "function"),
    ("functoin", "function"),
    ("retrun", "return"),
    ("reutrn", "return"),
    ("retunr", "return"),
    ("calss", "class"),
    ("improt", "import"),
    ("imoprt", "import"),
    ("exprot", "export"),
    ("pritn", "print"),
    ("prnit", "print"),
    ("lenght", "length"),
    ("widht", "width"),
    ("heigth", "height"),
    ("stirng", "string"),
    ("strign", "string"),
    ("flase", "false"),
    ("fasle", "false"),
    ("udpate", "update"),
    ("upadte", "update"),
    ("delte", "delete"),
    ("serach", "search"),
    ("saerch", "search"),
    ("qeury", "query"),
    ("quer", "query"),
    ("databse", "database"),
    ("datbase", "database"),
    ("conifg", "config"),
    ("confgi", "config"),
    ("cahce", "cache"),
    ("chache", "cache"),
    ("reuqest", "request"),
    ("requset", "request"),
    ("repsonse", "response"),
    ("respone", "response"),
    ("asycn", "async"),
    ("aysnc", "async"),
    ("awiat", "await"),
    ("defualt", "default"),
    ("varaible", "variable"),
    ("arguement", "argument"),
    ("paramter", "parameter"),
    ("obejct", "object"),
    ("arary", "array"),
    ("interger", "integer"),
    ("boolen", "boolean"),
    ("excpetion", "exception"),
    ("threshhold", "threshold"),
];

/// Immutable misspelling -> correction table
#[derive(Debug, Clone)]
pub struct TypoDictionary {
    /// Rules in insertion order; ties in fuzzy lookup resolve to the earliest
    rules: Vec<(String, String)>,
    index: HashMap<String, usize>,
    corrections: HashSet<String>,
}

impl TypoDictionary {
    /// Dictionary with the built-in programming typos
    pub fn new() -> Self {
        let mut dictionary = Self::empty();
        for (misspelling, correction) in PROGRAMMING_TYPOS {
            dictionary.insert(misspelling, correction);
        }
        dictionary.rebuild_corrections();
        dictionary
    }

    fn empty() -> Self {
        Self {
            rules: Vec::new(),
            index: HashMap::new(),
            corrections: HashSet::new(),
        }
    }

    /// Built-in typos extended with `rules`; a later rule for the same
    /// misspelling replaces the earlier one
    pub fn with_rules<I, S>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut dictionary = Self::new();
        for (misspelling, correction) in rules {
            let misspelling = misspelling.as_ref().trim().to_lowercase();
            let correction = correction.as_ref().trim().to_lowercase();
            if misspelling.is_empty()
                || correction.is_empty()
                || misspelling == correction
                || misspelling.contains(char::is_whitespace)
            {
                return Err(FuzzyError::InvalidRule {
                    misspelling,
                    correction,
                });
            }
            dictionary.insert(&misspelling, &correction);
        }
        dictionary.rebuild_corrections();
        Ok(dictionary)
    }

    fn insert(&mut self, misspelling: &str, correction: &str) {
        match self.index.get(misspelling) {
            Some(&i) => self.rules[i].1 = correction.to_string(),
            None => {
                self.index.insert(misspelling.to_string(), self.rules.len());
                self.rules
                    .push((misspelling.to_string(), correction.to_string()));
            }
        }
    }

    /// Corrections are derived from the final rules, so an overridden
    /// correction no longer counts as a known word.
    fn rebuild_corrections(&mut self) {
        self.corrections = self.rules.iter().map(|(_, c)| c.clone()).collect();
    }

    /// Exact lookup of a lower-cased token
    pub fn get(&self, misspelling: &str) -> Option<&str> {
        self.index
            .get(misspelling)
            .map(|&i| self.rules[i].1.as_str())
    }

    /// Whether `word` is the correct spelling of some rule
    pub fn is_correction(&self, word: &str) -> bool {
        self.corrections.contains(word)
    }

    /// Rules in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(m, c)| (m.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for TypoDictionary {
    fn default() -> Self {
        Self::new()
    }
}
