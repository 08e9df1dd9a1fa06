use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

// Use Lazy to ensure initialization happens only once across all tests.
static INIT_LOGGING: Lazy<()> = Lazy::new(|| {
    // Basic subscriber that respects RUST_LOG; try_init in case another
    // part of the test setup already installed one.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();
    println!("Test logging initialized.");
});

/// Call this function at the beginning of tests or test setup functions
/// that require logging to be initialized.
pub fn ensure_logging_initialized() {
    // Accessing the Lazy static ensures the initialization closure runs exactly once.
    Lazy::force(&INIT_LOGGING);
}
