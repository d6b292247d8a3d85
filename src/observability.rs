//! Observability hooks for the message layer.
//!
//! Slicing is cheap and range copies are not, so it is useful to see how often
//! each path runs and how many rows the expensive path moves. The `log_metric!`
//! macro emits one structured line per event through the `log` facade under the
//! `batchmsg::metrics` target, so it can be filtered independently of ordinary
//! debug output.
//!
//! The `#[cfg(debug_assertions)]` attribute compiles every call out of release builds.

/// Logs a structured key-value metric line at debug level, only in debug builds.
///
/// # Example
/// ```
/// use batchmsg::log_metric;
/// let rows = 4;
/// log_metric!("event" = "copy_ranges", "rows" = &rows);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("{}={}", $key, $value));
            )+

            $crate::__log::debug!(target: "batchmsg::metrics", "{}", parts.join(" "));
        }
    };
}
