use sqlx::error::ErrorKind;

use crate::application::repos::RepoError;

/// SQLSTATE `query_canceled`, raised for `statement_timeout` and cancellation.
const QUERY_CANCELED: &str = "57014";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    let db = match err {
        sqlx::Error::RowNotFound => return RepoError::NotFound,
        sqlx::Error::PoolTimedOut => return RepoError::Timeout,
        sqlx::Error::Database(db) => db,
        other => return RepoError::from_persistence(other),
    };

    if db.code().as_deref() == Some(QUERY_CANCELED) {
        return RepoError::Timeout;
    }

    let message = db.message().to_string();
    match db.kind() {
        ErrorKind::UniqueViolation => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        // A post or comment pointing at a row that vanished concurrently.
        ErrorKind::ForeignKeyViolation | ErrorKind::NotNullViolation => {
            RepoError::InvalidInput { message }
        }
        // `follows_no_self_follow`.
        ErrorKind::CheckViolation => RepoError::Integrity { message },
        _ => RepoError::Persistence(message),
    }
}
