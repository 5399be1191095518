//! Structured logging setup.

use tracing_subscriber::EnvFilter;

/// Default filter directive for a `-v` count.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "kingraph=warn",
        1 => "kingraph=info",
        _ => "kingraph=debug",
    }
}

/// Initialize structured logging to stderr.
///
/// `RUST_LOG` wins when set; otherwise the level follows `verbosity`
/// (see [`default_filter`]). Call once at program startup; subsequent calls
/// are silently ignored by `tracing_subscriber`.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    // try_init so double-init in tests doesn't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, "kingraph=warn" ; "quiet")]
    #[test_case(1, "kingraph=info" ; "verbose")]
    #[test_case(2, "kingraph=debug" ; "very verbose")]
    #[test_case(9, "kingraph=debug" ; "saturates")]
    fn verbosity_maps_to_filter(verbosity: u8, expected: &str) {
        assert_eq!(default_filter(verbosity), expected);
    }

    #[test]
    fn init_logging_does_not_panic() {
        init_logging(0);
        // Second call should also not panic (try_init ignores re-init).
        init_logging(2);
    }
}
