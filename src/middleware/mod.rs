//! Middleware layer.
//!
//! Wrappers that sit between the server and the router and see every
//! request, valid page path or not.
//!
//! - [`trace`] — per-request span with method, path, status and latency

mod trace;

pub use trace::trace;
