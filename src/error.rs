//! Startup and transport errors.

use std::path::PathBuf;

use crate::render::RenderError;

/// The error type returned by the server's fallible setup and run calls.
///
/// Page-level failures (invalid path, missing page, failed save) are HTTP
/// [`Response`](crate::Response)s, not `Error`s. This type surfaces failures
/// that stop the process: binding the port, opening the page directory,
/// compiling templates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("opening page store {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Render(#[from] RenderError),
}
