use tracing_subscriber::{EnvFilter, Registry, prelude::*};

/// Initialize tracing
pub async fn init() {
    let logger = tracing_subscriber::fmt::layer().compact();
    let env_filter = EnvFilter::try_from_default_env()
        .or(EnvFilter::try_new("info"))
        .unwrap();

    Registry::default().with(env_filter).with(logger).init();
}
