use tracing_subscriber::EnvFilter;

/// Initialise logging. Without `--debug` the level is fixed at `info`, so a
/// stray `RUST_LOG` in the environment does not flood the server output.
/// With `--debug` the default is `debug` and `RUST_LOG` may override it.
pub(crate) fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
