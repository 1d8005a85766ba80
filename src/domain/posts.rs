//! Post and comment input rules.

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use super::error::DomainError;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");

/// Number of characters used when a post is shown as a short label.
pub const LABEL_CHARS: usize = 15;

/// Validated post body submitted through the create or edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub text: String,
    pub group_slug: Option<String>,
}

impl PostDraft {
    pub fn parse(text: &str, group_slug: Option<&str>) -> Result<Self, DomainError> {
        let text = normalize_text(text);
        if text.trim().is_empty() {
            return Err(DomainError::validation("text", "This field is required."));
        }

        let group_slug = group_slug
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self { text, group_slug })
    }
}

/// Validated comment body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub text: String,
}

impl CommentDraft {
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let text = normalize_text(text);
        if text.trim().is_empty() {
            return Err(DomainError::validation("text", "This field is required."));
        }
        Ok(Self { text })
    }
}

/// Browsers submit textarea content with CRLF line endings.
fn normalize_text(raw: &str) -> String {
    raw.replace("\r\n", "\n")
}

pub fn label(text: &str) -> String {
    text.chars().take(LABEL_CHARS).collect()
}

pub fn format_human_date(when: OffsetDateTime) -> String {
    when.date()
        .format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| when.date().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn blank_text_is_rejected() {
        let err = PostDraft::parse("   \r\n ", None).expect_err("blank text");
        assert!(matches!(
            err,
            DomainError::Validation { field: "text", .. }
        ));
    }

    #[test]
    fn empty_group_selection_means_no_group() {
        let draft = PostDraft::parse("hello", Some("  ")).expect("valid draft");
        assert_eq!(draft.group_slug, None);

        let draft = PostDraft::parse("hello", Some("cats")).expect("valid draft");
        assert_eq!(draft.group_slug.as_deref(), Some("cats"));
    }

    #[test]
    fn crlf_is_normalized() {
        let draft = CommentDraft::parse("one\r\ntwo").expect("valid comment");
        assert_eq!(draft.text, "one\ntwo");
    }

    #[test]
    fn label_truncates_on_characters_not_bytes() {
        assert_eq!(label("Текст поста для проверки"), "Текст поста для");
        assert_eq!(label("short"), "short");
    }

    #[test]
    fn human_date_uses_long_month() {
        let when = datetime!(2024-03-07 10:00 UTC);
        assert_eq!(format_human_date(when), "7 March 2024");
    }
}
