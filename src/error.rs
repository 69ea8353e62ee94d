//! Centralized error type for the radiodial umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] radiodial_core::Error),

    #[error("Output: {0}")]
    Output(#[from] radiodial_output::Error),

    #[error("No station catalog given")]
    MissingCatalog,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
