//! Tracing and logging setup shared by every bedrock binary and test harness.

/// Initialize process-wide tracing.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (format, filters).
pub mod tracing;

pub use self::tracing::LogFormat;
