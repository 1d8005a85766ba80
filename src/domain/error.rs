use thiserror::Error;

/// A rule on user-supplied content was broken.
///
/// `field` names the form field the message belongs to, so the HTTP layer can
/// render it next to the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
