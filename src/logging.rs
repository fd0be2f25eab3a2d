//! ## Logging Configuration
//!
//! This module sets up logging automatically at program startup using the `ctor` crate.
//! Logging behavior is controlled by the `DEBUG_TRIP_LOADER` environment variable:
//!
//! - **Disabled** (default): If the variable is unset, empty, or explicitly set to `"0"` or `"false"`,
//!   no logging will be initialized.
//! - **Enabled**: Any other value enables logging with a maximum log level of `DEBUG`.
//!
//! ### Usage Example
//!
//! To see download, parsing, and cleaning progress, set the environment variable before running
//! your application:
//!
//! ```sh
//! export DEBUG_TRIP_LOADER=true
//! ```

use ctor::ctor;
use tracing::Level;

/// Name of the environment variable that switches logging on.
pub const DEBUG_ENV_VAR: &str = "DEBUG_TRIP_LOADER";

/// Returns true when the given value of [`DEBUG_ENV_VAR`] should leave logging off.
pub(crate) fn logging_disabled(value: Option<&str>) -> bool {
    value.map_or(true, |v| v == "0" || v == "false" || v.is_empty())
}

#[ctor]
fn set_debug_level() {
    let value = std::env::var(DEBUG_ENV_VAR).ok();

    if !logging_disabled(value.as_deref()) {
        // A host application may have installed its own subscriber already.
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::logging_disabled;

    #[test]
    fn test_logging_switch() {
        assert!(logging_disabled(None));
        assert!(logging_disabled(Some("")));
        assert!(logging_disabled(Some("0")));
        assert!(logging_disabled(Some("false")));
        assert!(!logging_disabled(Some("1")));
        assert!(!logging_disabled(Some("true")));
    }
}
