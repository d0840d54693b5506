//! Logging setup for processes embedding the timelock workflow

use tracing::Level;

/// Installs a fmt subscriber at `level` (`"info"`, `"debug"`, ...).
/// Unknown levels fall back to info. A second call leaves the first
/// subscriber in place.
pub fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// Debug-level logging routed through the test harness's captured output.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_logging("debug");
        init_logging("not-a-level");
        init_test_logging();
    }
}
