use flag_engine::config::Config;
use once_cell::sync::Lazy;

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);

/// Installs a tracing subscriber once per test binary; later calls are no-ops.
pub fn setup() {
    let _unused = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
