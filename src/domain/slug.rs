//! Group slug rules.
//!
//! A slug is the public identity of a group and appears in `/group/{slug}/`,
//! so it is restricted to lowercase ASCII letters, digits, `-` and `_`.

use slug::slugify;
use thiserror::Error;

pub const MAX_SLUG_LEN: usize = 50;
pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` may only contain a-z, 0-9, `-` and `_`")]
    InvalidCharacters { slug: String },
    #[error("slug `{slug}` is longer than {MAX_SLUG_LEN} characters")]
    TooLong { slug: String },
}

/// Derive a slug from a human-readable title, truncated to the column width.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    let truncated: String = candidate.chars().take(MAX_SLUG_LEN).collect();
    Ok(truncated.trim_end_matches('-').to_string())
}

/// Check an operator-supplied slug without rewriting it.
pub fn validate_slug(slug: &str) -> Result<(), SlugError> {
    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if slug.chars().count() > MAX_SLUG_LEN {
        return Err(SlugError::TooLong {
            slug: slug.to_string(),
        });
    }
    let valid = slug
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
    if !valid {
        return Err(SlugError::InvalidCharacters {
            slug: slug.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_lowercases_and_dashes() {
        assert_eq!(derive_slug("Cats & Dogs").expect("slug"), "cats-dogs");
    }

    #[test]
    fn derive_slug_rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn derived_slug_respects_column_width() {
        let title = "word ".repeat(40);
        let slug = derive_slug(&title).expect("slug");
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert!(validate_slug(&slug).is_ok());
    }

    #[test]
    fn validate_slug_accepts_underscores() {
        assert!(validate_slug("rust_lang-2024").is_ok());
    }

    #[test]
    fn validate_slug_rejects_uppercase_and_spaces() {
        assert!(matches!(
            validate_slug("Rust Lang"),
            Err(SlugError::InvalidCharacters { .. })
        ));
    }

    #[test]
    fn validate_slug_rejects_long_values() {
        let slug = "a".repeat(MAX_SLUG_LEN + 1);
        assert!(matches!(
            validate_slug(&slug),
            Err(SlugError::TooLong { .. })
        ));
    }
}
