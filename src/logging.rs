//! Logger setup.
//!
//! The crate only logs through the `log` facade. Hosts that already install a logger
//! can ignore this module; [`init_logging`] is a convenience for binaries and demos.

use crate::config::LogLevel;

/// Installs `env_logger` with `level` as the default filter. `RUST_LOG` overrides it.
///
/// Calling this more than once (or after another logger was installed) is harmless.
pub fn init_logging(level: LogLevel) {
    let result = env_logger::Builder::new()
        .filter_level(level.into())
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();

    if result.is_err() {
        log::debug!("logger already initialized, keeping the existing one");
    }
}
