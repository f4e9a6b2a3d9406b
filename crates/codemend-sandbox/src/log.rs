//! Quiet-mode aware logging. When CODEMEND_QUIET=1, suppress info events.

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::log::is_quiet() {
            tracing::info!($($arg)*);
        }
    }};
}

pub fn is_quiet() -> bool {
    codemend_core::config::ObservabilityConfig::from_env().quiet
}
