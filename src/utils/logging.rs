//! Tracing setup for binaries and demos

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`
///
/// Falls back to `default_filter` when `RUST_LOG` is unset or unparsable.
/// Returns `false` if a global subscriber was already installed, which makes
/// repeated calls harmless.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing("warn");
        assert!(!init_tracing("warn"));
    }
}
