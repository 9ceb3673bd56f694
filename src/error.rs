//! Typed error taxonomy replacing the original's errno-return-code
//! propagation (`SPEC_FULL.md` §4.12). Per-connection and per-request
//! failures never reach this type — they're resolved locally into an HTTP
//! response or a `finish_job` call inside the Worker/Listener event loop.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{context}: {source}")]
    Setup {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AppError {
    pub fn setup(context: &'static str, source: io::Error) -> AppError {
        AppError::Setup { context, source }
    }
}
