use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the governance service.
///
/// The default filter applies `default_level` to this crate while
/// keeping dependency noise down: sqlx logs every statement at INFO and
/// the publisher's HTTP client chatters at DEBUG, neither of which
/// belongs in governance logs. Setting `RUST_LOG` replaces the whole
/// filter.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{default_level},sqlx=warn,hyper=warn,reqwest=warn"
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

/// Initialize tracing for tests (doesn't fail if already initialized).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rulegov=debug")
        .try_init();
}
