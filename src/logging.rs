//! Logging
//!
//! Tracing subscriber setup for the CLI

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize a tracing subscriber writing to stderr
///
/// `RUST_LOG` takes precedence; otherwise the level is `info`, or `debug`
/// when `verbose` is set. Reports are printed on stdout, so logs never mix
/// with them.
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default_level = if verbose { "label_sync=debug,info" } else { "info" };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true)
        .compact();

    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
