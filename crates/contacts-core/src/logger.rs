use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a compact stderr subscriber. `RUST_LOG` wins over `verbose`.
///
/// Logs go to stderr so stdout carries nothing but the JSON response.
pub fn init_cli_logger(verbose: bool) {
    let default_filter = if verbose {
        "contacts_core=debug,info"
    } else {
        "contacts_core=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}
