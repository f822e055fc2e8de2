// Property-based tests for the fuzzy matcher

use std::collections::HashSet;

use mcpkit_fuzzy::{best_per_term, FuzzyConfig, FuzzyMatcher};
use proptest::prelude::*;

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,10}"
}

/// Suggested queries are unique, sorted and within the configured count.
#[test]
fn prop_suggestions_are_unique_and_sorted() {
    let matcher = FuzzyMatcher::default();
    proptest!(|(query in prop::collection::vec(word(), 0..5), vocabulary in prop::collection::vec(word(), 0..20))| {
        let suggestions = matcher.generate_suggestions(&query.join(" "), &vocabulary);

        let unique: HashSet<_> = suggestions.iter().map(|s| s.query.as_str()).collect();
        prop_assert_eq!(unique.len(), suggestions.len());
        prop_assert!(suggestions.len() <= matcher.config().suggestion_count);
        prop_assert!(suggestions.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        for s in &suggestions {
            prop_assert!((0.0..=1.0).contains(&s.confidence));
            prop_assert_eq!(s.changed_words.len(), 1);
        }
    });
}

/// Same inputs always give the same output.
#[test]
fn prop_matching_is_deterministic() {
    let matcher = FuzzyMatcher::default();
    proptest!(|(needle in word(), haystack in prop::collection::vec(word(), 0..20))| {
        let first = matcher.fuzzy_match(&needle, &haystack);
        let second = matcher.fuzzy_match(&needle, &haystack);
        prop_assert_eq!(&first, &second);

        let query = format!("{needle} {}", haystack.join(" "));
        prop_assert_eq!(matcher.correct_typos(&query), matcher.correct_typos(&query));
    });
}

/// Scores stay in [0, 1], results are sorted, and dedup keeps one entry per term.
#[test]
fn prop_match_scores_are_bounded() {
    let matcher = FuzzyMatcher::default();
    proptest!(|(needle in word(), haystack in prop::collection::vec(word(), 0..20))| {
        let matches = matcher.fuzzy_match(&needle, &haystack);
        prop_assert!(matches.iter().all(|m| (0.0..=1.0).contains(&m.score)));
        prop_assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));

        let best = best_per_term(matches);
        let terms: HashSet<_> = best.iter().map(|m| m.term.as_str()).collect();
        prop_assert_eq!(terms.len(), best.len());
    });
}

/// A tighter edit limit never yields more levenshtein matches.
#[test]
fn prop_edit_limit_is_monotonic() {
    let tight = FuzzyMatcher::new(FuzzyConfig {
        max_edit_distance: 1,
        ..Default::default()
    })
    .unwrap();
    let loose = FuzzyMatcher::default();

    proptest!(|(needle in word(), haystack in prop::collection::vec(word(), 0..20))| {
        let count = |m: &FuzzyMatcher| {
            m.fuzzy_match(&needle, &haystack)
                .iter()
                .filter(|m| m.method == mcpkit_fuzzy::MatchMethod::Levenshtein)
                .count()
        };
        prop_assert!(count(&tight) <= count(&loose));
    });
}
