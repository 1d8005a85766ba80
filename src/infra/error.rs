use std::io;

use thiserror::Error;

/// Start-up and operator-command failures below the application layer.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("cannot reach the database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(#[from] tracing_subscriber::util::TryInitError),
    #[error("`{0}` is not configured")]
    MissingSetting(&'static str),
}

impl InfraError {
    /// Wrap an I/O failure with what was being attempted.
    pub fn io(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io { context, source }
    }
}
