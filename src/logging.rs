use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. The terminal belongs to the board, so
/// output goes to `log_file`. `RUST_LOG` wins over `level`.
pub fn init(level: &str, log_file: &str) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .compact();

    // Already-installed subscribers are left in place.
    let _ = subscriber.try_init();
    Ok(())
}
