//! Page request dispatcher.
//!
//! One table entry per [`Operation`]. The path is validated once, here; the
//! handler receives the extracted [`PageName`](crate::PageName) as an
//! argument. A path that fails validation gets `404` and no handler runs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::Response;
use crate::validate::{self, Operation, PagePath};

/// The application router.
///
/// Build it once at startup with [`Router::on`] and hand it to
/// [`Server::serve`](crate::Server::serve). It is never modified after that:
/// every connection shares the same table and state behind an `Arc`.
pub struct Router<S> {
    state: Arc<S>,
    routes: HashMap<Operation, BoxedHandler<S>>,
}

impl<S: Send + Sync + 'static> Router<S> {
    /// Empty router. `state` is handed to every handler.
    pub fn new(state: S) -> Self {
        Self { state: Arc::new(state), routes: HashMap::new() }
    }

    /// Registers the handler for `operation`. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if `operation` already has a handler.
    pub fn on(mut self, operation: Operation, handler: impl Handler<S>) -> Self {
        if self.routes.insert(operation, handler.into_boxed_handler()).is_some() {
            panic!("route `{operation}` registered twice");
        }
        self
    }

    pub fn state(&self) -> &Arc<S> { &self.state }

    /// Routes one request and produces one response.
    pub async fn dispatch(&self, req: Request) -> Response {
        let PagePath { operation, name } = match validate::parse(req.path()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("{e}");
                return Response::not_found();
            }
        };

        let Some(handler) = self.routes.get(&operation) else {
            tracing::debug!(%operation, "no handler registered");
            return Response::not_found();
        };
        handler.call(Arc::clone(&self.state), req, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PageName;
    use http::{Method, StatusCode};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Calls(AtomicUsize);

    async fn echo(calls: Arc<Calls>, _req: Request, name: PageName) -> Response {
        calls.0.fetch_add(1, Ordering::SeqCst);
        Response::text(name.as_str())
    }

    fn get(path: &str) -> Request {
        Request::new(Method::GET, path)
    }

    #[tokio::test]
    async fn passes_validated_name_to_handler() {
        let router = Router::new(Calls::default()).on(Operation::View, echo);

        let res = router.dispatch(get("/view/Alpha")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"Alpha");
        assert_eq!(router.state().0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_paths_never_reach_a_handler() {
        let router = Router::new(Calls::default())
            .on(Operation::View, echo)
            .on(Operation::Edit, echo)
            .on(Operation::Save, echo);

        for path in ["/view/../etc", "/delete/Alpha", "/", "/view/", "/edit/a.b"] {
            let res = router.dispatch(get(path)).await;
            assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "{path}");
        }
        assert_eq!(router.state().0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_operation_is_not_found() {
        let router = Router::new(Calls::default()).on(Operation::View, echo);
        let res = router.dispatch(get("/edit/Alpha")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_route_panics() {
        let _ = Router::new(Calls::default())
            .on(Operation::Save, echo)
            .on(Operation::Save, echo);
    }
}
