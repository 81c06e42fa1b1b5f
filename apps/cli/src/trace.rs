use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log to stderr so progress output on stdout stays readable.
///
/// `RUST_LOG` wins over the verbosity flag.
pub fn init_tracing(verbose: u8) {
    let default = if verbose > 0 {
        "shortreels=debug,shortreels_core=debug"
    } else {
        "shortreels=info,shortreels_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        )
        .with(filter)
        .init();
}
