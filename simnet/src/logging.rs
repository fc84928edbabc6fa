use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered at `level`.
///
/// `RUST_LOG` overrides `level`. Calling this again after a subscriber is
/// installed is a no-op, so every test may call it.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
