//! Logging setup
//!
//! env_logger with the configured level as default filter. RUST_LOG wins when
//! set. libinput's own messages (routed through the `input` crate) are capped
//! at error; they are noisy at any lower level.

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Target of the libinput crate's log records
const BACKEND_TARGET: &str = "input";

/// Logger builder with `default_level` as fallback filter
pub fn builder(default_level: &str) -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));
    builder.filter_module(BACKEND_TARGET, LevelFilter::Error);
    builder
}

/// Install the global logger. A second call is ignored.
pub fn init(default_level: &str) {
    let _ = builder(default_level).try_init();
}
