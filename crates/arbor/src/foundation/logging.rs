//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
///
/// Honours `RUST_LOG`. Safe to call more than once: the first call installs
/// the logger, later calls (and embedders that installed their own logger)
/// leave it in place.
pub fn init() {
    if let Err(e) = env_logger::try_init() {
        log::debug!("Logger already installed, keeping it: {}", e);
    }
}
