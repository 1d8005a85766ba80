use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    cache::metric,
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static DESCRIBE: Once = Once::new();

/// Install the process-wide subscriber. `RUST_LOG` directives refine the
/// configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    DESCRIBE.call_once(describe_cache_counters);

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let output = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output)
        .try_init()?;
    Ok(())
}

fn describe_cache_counters() {
    let counters = [
        (metric::HIT, "Global feed requests answered from the response cache."),
        (metric::MISS, "Global feed requests that had to be rendered."),
        (metric::STORE, "Rendered responses written to the response cache."),
        (metric::CLEAR, "Operator-triggered response cache clears."),
    ];
    for (name, description) in counters {
        describe_counter!(name, Unit::Count, description);
    }
}
