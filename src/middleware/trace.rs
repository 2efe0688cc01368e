//! Request tracing.

use std::future::Future;
use std::time::Instant;

use tracing::Instrument;

use crate::request::Request;
use crate::response::Response;

/// Runs `next` inside a `request` span and logs the outcome.
///
/// Server errors log at `warn`, everything else at `info`.
pub async fn trace<F, Fut>(req: Request, next: F) -> Response
where
    F: FnOnce(Request) -> Fut,
    Fut: Future<Output = Response>,
{
    let span = tracing::info_span!("request", method = %req.method(), path = %req.path());
    async move {
        let started = Instant::now();
        let res = next(req).await;
        let status = res.status_code().as_u16();
        let latency_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        if res.status_code().is_server_error() {
            tracing::warn!(status, latency_us, "request failed");
        } else {
            tracing::info!(status, latency_us, "request");
        }
        res
    }
    .instrument(span)
    .await
}
