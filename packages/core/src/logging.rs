use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging. `RUST_LOG` overrides the `info` default.
///
/// Call once at startup, before the first log line.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Air quality tracker logging initialized");
}
