//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Default filter directive when `RUST_LOG` does not set one for this crate.
pub const DEFAULT_DIRECTIVE: &str = "energy_settlement=info";

/// Installs a formatting subscriber filtered by `RUST_LOG` plus
/// [`DEFAULT_DIRECTIVE`]. Logs go to stderr so stdout stays the report.
pub fn init_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(
        DEFAULT_DIRECTIVE
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
    );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
