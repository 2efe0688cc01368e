//! # wikid
//!
//! A small wiki server. Pages are named, stored one file each, and reached
//! through exactly three paths:
//!
//! - `/view/{name}` — render the page, or redirect to the editor if it
//!   doesn't exist yet
//! - `/edit/{name}` — an HTML form with the current body (empty for a new page)
//! - `/save/{name}` — store form field `body` and redirect back to the view
//!
//! `{name}` is one or more ASCII letters or digits. Any other path is `404`
//! before a handler or the store is touched, so names are safe filename stems.
//!
//! ## Pieces
//!
//! - [`validate`] — the path grammar, [`Operation`] and [`PageName`]
//! - [`store`] — [`PageStore`] and the atomic-write [`FsStore`]
//! - [`render`] — the `view`/`edit` layouts, compiled once at startup
//! - [`Router`] + [`wiki`] — the operation table and its three handlers
//! - [`Server`] — hyper/tokio transport with graceful shutdown
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use wikid::{FsStore, Renderer, Server, Wiki};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wikid::Error> {
//!     let store = FsStore::open("pages")?;
//!     let app = Wiki::new(store, Renderer::new()?).router();
//!
//!     Server::bind("127.0.0.1:8080".parse().unwrap()).serve(app).await
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod middleware;
pub mod render;
pub mod store;
pub mod validate;
pub mod wiki;

pub use config::Config;
pub use error::Error;
pub use handler::Handler;
pub use render::{Mode, RenderError, Renderer};
pub use request::{FormError, Request};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{DEFAULT_MAX_BODY_BYTES, Server};
pub use store::{FsStore, Page, PageStore, StoreError};
pub use validate::{InvalidPath, Operation, PageName, PagePath};
pub use wiki::{PageError, Wiki};
