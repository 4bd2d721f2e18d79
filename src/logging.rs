use time::UtcOffset;
use tracing_subscriber::{
    fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::{errors::InitializationError, LoggingConfig, StackError};

pub fn setup_logging(config: &LoggingConfig) -> Result<(), StackError> {
    // Validate logging config before proceeding
    config.validate().map_err(StackError::Config)?;

    let timer = OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        time::format_description::well_known::Rfc3339,
    );

    // Determine base level filter
    let base_level = config.get_level_filter();

    // Build the EnvFilter
    let mut env_filter = EnvFilter::default().add_directive(base_level.into());

    // If trace_frames is enabled, add more specific filtering
    if config.trace_frames {
        env_filter = env_filter
            .add_directive("modbus_serial::transport=trace".parse().unwrap())
            .add_directive("modbus_serial::frame=trace".parse().unwrap());
    }

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(config.thread_ids)
        .with_thread_names(config.thread_names)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_level(true)
        .with_timer(timer);

    let layer = if config.format.eq_ignore_ascii_case("json") {
        layer.json().with_filter(env_filter).boxed()
    } else {
        layer.with_filter(env_filter).boxed()
    };

    Registry::default().with(layer).try_init().map_err(|e| {
        StackError::Init(InitializationError::logging(format!(
            "Failed to initialize logging: {}",
            e
        )))
    })?;

    Ok(())
}

// Helper for creating short correlation identifiers attached to master
// transactions and slave polls.
pub fn generate_request_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    format!("{:x}", rng.gen::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_distinct() {
        let a = generate_request_id();
        let b = generate_request_id();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }
}
