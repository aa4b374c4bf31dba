use std::fs::File;
use std::sync::Mutex;

use dw_core::DictWikiError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{map_cli_log_file, map_cli_log_level, LogArgs};

/// Installs the console subscriber and, when asked, a plain-text copy of
/// the log in a file. `RUST_LOG` wins over `--log-level`.
pub(crate) fn init_logging(args: &LogArgs) -> Result<(), DictWikiError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&args.log_level).map_err(map_cli_log_level)?,
    };
    let file_layer = match &args.log_file {
        Some(path) => {
            let file = File::create(path).map_err(map_cli_log_file)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    // A subscriber may already be installed when running inside tests.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init();
    Ok(())
}
