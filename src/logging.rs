//! Console logging for the CLI and server front ends.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Quiet runs still surface warnings (invalid images, failed session
/// sweeps); `--verbose` adds per-image pipeline progress.
pub fn init(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = fmt()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_safe_to_call_repeatedly() {
        assert!(init(false).is_ok());
        assert!(init(true).is_ok());
    }
}
