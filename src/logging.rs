//! Log output for the `cai` binary.
//!
//! Logs go to stderr so stdout carries only answers. `RUST_LOG` wins when
//! set; otherwise the `-v` count picks the level for this crate.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,custom_ai=info",
        2 => "info,custom_ai=debug",
        _ => "debug,custom_ai=trace",
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .without_time();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_crate_level() {
        assert_eq!(default_directive(0), "warn");
        assert!(default_directive(1).contains("custom_ai=info"));
        assert!(default_directive(7).contains("custom_ai=trace"));
    }

    #[test]
    fn directives_parse() {
        for v in 0..4 {
            assert!(EnvFilter::try_new(default_directive(v)).is_ok());
        }
    }
}
