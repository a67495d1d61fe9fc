//! Operator logging.
//!
//! Events go to stderr so that commands printing results (`assemble`
//! without `--out`, `script`) keep stdout clean.
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static SUBSCRIBER: OnceCell<()> = OnceCell::new();

/// Default filter for a `-v` count: `info`, then `debug`, then `trace`.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the process-wide subscriber.
///
/// Arguments
/// -----------------
/// * `verbosity`: number of `-v` flags, used only when `RUST_LOG` is unset or invalid.
///
/// Only the first call has an effect.
pub fn init_tracing(verbosity: u8) {
    SUBSCRIBER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_thread_ids(true)
            .try_init();
    });
}
