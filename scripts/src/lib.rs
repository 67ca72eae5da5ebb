//! Shared setup of the operator scripts.
use tracing_subscriber::{fmt, EnvFilter};

/// Load `.env` if present, then install the `RUST_LOG` driven subscriber,
/// defaulting to `info`.
pub fn init() {
    dotenv::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}
