/// Emits a `tracing::debug!` record only when the tracker was configured
/// with debug logging. Tracking problems are otherwise silent.
macro_rules! debug_log {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            ::tracing::debug!(target: "zpanalytics", $($arg)+);
        }
    };
}

pub(crate) use debug_log;
