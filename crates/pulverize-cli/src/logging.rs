//! Log output for the `pulverize` binary.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise pulverize logs at `info`, or `debug`
/// with `verbose`.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pulverize_render={default_level},pulverize_cli={default_level},warn"
        ))
    });

    // A second init (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
