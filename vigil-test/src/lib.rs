//! Test utilities for the Vigil workspace
//!
//! Common helpers shared by the integration suites of every crate:
//!
//! - **Test Environment**: isolated folders for local-file and relational stores
//! - **Fixtures**: dataframes of known shape and content
//! - **Assertions**: dataframe and storage comparisons with readable failures
//! - **Object client**: an in-memory stand-in for S3

pub mod assertions;
pub mod environment;
pub mod fixtures;
pub mod object;

// Re-export commonly used items
pub use environment::TestEnvironment;
pub use fixtures::{
    colour_frame, mixed_type_frame, numeric_frame, wide_numeric_frame, FrameBuilder,
};
pub use object::InMemoryObjectClient;

// Re-export test dependencies for convenience
pub use anyhow::{Context, Result};
pub use tempfile;

use once_cell::sync::OnceCell;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Initialize test logging (safe to call from every test)
pub fn init_test_logging() {
    LOGGING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("VIGIL_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
