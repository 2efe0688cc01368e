//! The three page operations.
//!
//! | Path | Page exists | Page missing | Store failure |
//! |---|---|---|---|
//! | `/view/{name}` | `200` view layout | `302` → `/edit/{name}` | `500` |
//! | `/edit/{name}` | `200` edit layout | `200` edit layout, empty body | `500` |
//! | `/save/{name}` | `302` → `/view/{name}` | (created) | `500` |
//!
//! A missing page is never an error: viewing one sends the user to the editor,
//! and editing one starts from an empty body. Only store and render failures
//! produce `500`, with the cause in the response body. Saves are not retried.
//!
//! A save whose body can't be decoded as a form is refused (`400`/`415`)
//! and the stored page is left alone.

use std::sync::Arc;

use http::StatusCode;

use crate::render::{Mode, RenderError, Renderer};
use crate::request::{FormError, Request};
use crate::response::{IntoResponse, Response};
use crate::router::Router;
use crate::store::{Page, PageStore, StoreError};
use crate::validate::{Operation, PageName};

/// Form field carrying the page body on save.
pub const BODY_FIELD: &str = "body";

/// Shared, read-only state for the page handlers.
pub struct Wiki {
    store: Arc<dyn PageStore>,
    renderer: Renderer,
}

impl Wiki {
    pub fn new(store: impl PageStore, renderer: Renderer) -> Self {
        Self { store: Arc::new(store), renderer }
    }

    /// The route table: `view`, `edit` and `save`.
    pub fn router(self) -> Router<Self> {
        Router::new(self)
            .on(Operation::View, view)
            .on(Operation::Edit, edit)
            .on(Operation::Save, save)
    }

    /// Loads `name` on the blocking pool.
    async fn load(&self, name: &PageName) -> Result<Option<Page>, StoreError> {
        let store = Arc::clone(&self.store);
        let task_name = name.clone();
        tokio::task::spawn_blocking(move || store.load(&task_name))
            .await
            .unwrap_or_else(|e| Err(StoreError::Read { name: name.clone(), source: std::io::Error::other(e) }))
    }

    /// Saves `page` on the blocking pool.
    async fn save(&self, page: Page) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        let name = page.name.clone();
        tokio::task::spawn_blocking(move || store.save(&page))
            .await
            .unwrap_or_else(|e| Err(StoreError::Write { name, source: std::io::Error::other(e) }))
    }

    fn render(&self, mode: Mode, page: &Page) -> Result<Response, PageError> {
        Ok(Response::html(self.renderer.render(mode, page)?))
    }
}

/// Failures that end a page request.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Form(#[from] FormError),
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) | Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Form(FormError::Multipart(_)) => StatusCode::BAD_REQUEST,
            Self::Form(FormError::MissingType | FormError::UnsupportedType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        } else {
            tracing::warn!("{self}");
        }
        Response::error(status, self.to_string())
    }
}

/// `GET /view/{name}`
pub async fn view(wiki: Arc<Wiki>, _req: Request, name: PageName) -> Result<Response, PageError> {
    match wiki.load(&name).await? {
        Some(page) => wiki.render(Mode::View, &page),
        None => {
            tracing::debug!(page = %name, "no such page, redirecting to editor");
            Ok(Response::redirect(&Operation::Edit.path(&name)))
        }
    }
}

/// `GET /edit/{name}`
pub async fn edit(wiki: Arc<Wiki>, _req: Request, name: PageName) -> Result<Response, PageError> {
    let page = match wiki.load(&name).await? {
        Some(page) => page,
        None => Page::empty(name),
    };
    wiki.render(Mode::Edit, &page)
}

/// `POST /save/{name}` with form field `body`. A missing field saves an
/// empty page.
pub async fn save(wiki: Arc<Wiki>, req: Request, name: PageName) -> Result<Response, PageError> {
    let body = req.form_value(BODY_FIELD).await?.unwrap_or_default();
    let location = Operation::View.path(&name);
    let len = body.len();

    wiki.save(Page::new(name.clone(), body)).await?;
    tracing::info!(page = %name, bytes = len, "page saved");
    Ok(Response::redirect(&location))
}
