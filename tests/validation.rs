// tests/validation.rs

use quilldag::validation::{validate, word_count, Verdict};
use quilldag_test_utils::words;

#[test]
fn counts_maximal_word_character_runs() {
    assert_eq!(word_count(""), 0);
    assert_eq!(word_count("   \n\t "), 0);
    assert_eq!(word_count("one two  three"), 3);
    // Punctuation splits runs; digits and underscores are word characters.
    assert_eq!(word_count("It's a well-known fact_1, 2024."), 7);
    assert_eq!(word_count("naïve café"), 2);
}

#[test]
fn rejects_below_minimum() {
    assert_eq!(validate(&words(99), 100, 200), Verdict::Reject(99));
    assert!(!validate("", 1, 10).is_accept());
}

#[test]
fn accepts_at_minimum() {
    assert_eq!(validate(&words(100), 100, 200), Verdict::Accept(100));
}

#[test]
fn maximum_is_advisory() {
    let verdict = validate(&words(250), 100, 200);
    assert!(verdict.is_accept());
    assert_eq!(verdict.word_count(), 250);
}
