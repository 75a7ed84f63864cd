//! Tracing subscriber setup for the `rewind` binary and test harnesses.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Where the logs are going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines on stderr.
    Development,
    /// JSON lines on stderr, for CI log collectors.
    Ci,
    /// Output captured by the test harness.
    Test,
}

impl Profile {
    /// `Ci` when the environment says so (`CI` set and not "false"/"0").
    pub fn detect() -> Self {
        match std::env::var("CI") {
            Ok(v) if !v.is_empty() && v != "false" && v != "0" => Profile::Ci,
            _ => Profile::Development,
        }
    }
}

static INIT_ONCE: Once = Once::new();

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "rewind=debug" } else { "rewind=info" })
    })
}

/// Install the global subscriber. Only the first call has any effect.
///
/// `RUST_LOG` overrides the default filter.
pub fn init(profile: Profile, verbose: bool) {
    INIT_ONCE.call_once(|| {
        // try_init: a host test harness may already own the global subscriber
        let _ = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(filter(verbose))
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
            Profile::Ci => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter(verbose))
                .with_writer(std::io::stderr)
                .try_init(),
            Profile::Test => tracing_subscriber::fmt()
                .with_env_filter(filter(true))
                .with_test_writer()
                .try_init(),
        };
    });
}
