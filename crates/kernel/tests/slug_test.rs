#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Slug derivation integration tests.

use loam_kernel::slug::slugify;

#[test]
fn titles_become_url_safe_slugs() {
    assert_eq!(slugify("My First Blog Post", 100), "my-first-blog-post");
    assert_eq!(slugify("Hello, World!", 100), "hello-world");
    assert_eq!(slugify("Post #42: The Answer", 100), "post-42-the-answer");
}

#[test]
fn punctuation_runs_collapse_to_single_hyphens() {
    assert_eq!(slugify("a -- b ++ c", 100), "a-b-c");
    assert_eq!(slugify("...leading and trailing...", 100), "leading-and-trailing");
}

#[test]
fn identical_titles_yield_identical_bases() {
    // Collision handling appends `-1`, `-2`, … at assignment time; the
    // derivation itself is deterministic.
    assert_eq!(slugify("Same Title", 100), slugify("Same Title", 100));
}

#[test]
fn suffix_convention_is_base_then_counter() {
    let base = slugify("Same Title", 100);
    assert_eq!(base, "same-title");
    assert_eq!(format!("{base}-1"), "same-title-1");
}

#[test]
fn max_length_is_honored_on_word_boundaries() {
    let slug = slugify("a very long title with many words in it", 15);
    assert!(slug.len() <= 15);
    assert!(!slug.ends_with('-'));
    assert_eq!(slug, "a-very-long");
}

#[test]
fn non_ascii_titles_can_yield_empty_slugs() {
    // Posts with such titles simply go slugless; lookups fall back to id.
    assert_eq!(slugify("日本語のタイトル", 100), "");
    assert_eq!(slugify("🎉🎉🎉", 100), "");
}
