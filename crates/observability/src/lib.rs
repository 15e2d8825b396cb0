//! Process-wide tracing setup for stockledger binaries and test harnesses.

/// Initialize tracing with the default filter (`info`, overridable via
/// `RUST_LOG`). Calling it again is a no-op.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Tracing subscriber configuration.
pub mod tracing;

pub use self::tracing::{LogFormat, init_with};
