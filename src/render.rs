//! Page templates.
//!
//! Two layouts, `view.html` and `edit.html`, compiled once at startup into a
//! [`minijinja::Environment`]. Each layout sees two variables:
//!
//! | Variable | Value |
//! |---|---|
//! | `title` | the page name |
//! | `body`  | the page body as text (invalid UTF-8 is replaced) |
//!
//! Output is HTML-escaped. A broken layout is reported by the constructor,
//! so a running server renders any page it can load.

use std::fs;
use std::path::{Path, PathBuf};

use minijinja::{Environment, context};

use crate::store::Page;
use crate::validate::PageName;

const VIEW_TEMPLATE: &str = include_str!("../templates/view.html");
const EDIT_TEMPLATE: &str = include_str!("../templates/edit.html");

/// Which layout to apply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    View,
    Edit,
}

impl Mode {
    pub fn template_name(self) -> &'static str {
        match self {
            Self::View => "view.html",
            Self::Edit => "edit.html",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template {name}: {source}")]
    Template {
        name: &'static str,
        #[source]
        source: minijinja::Error,
    },

    #[error("loading template {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Compiled page layouts. Immutable once built; share it behind an `Arc`.
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    /// Renderer with the built-in layouts.
    pub fn new() -> Result<Self, RenderError> {
        Self::with_sources(VIEW_TEMPLATE.to_owned(), EDIT_TEMPLATE.to_owned())
    }

    /// Renderer with `view.html` and `edit.html` read from `dir`.
    ///
    /// Both files must exist and compile.
    pub fn from_dir(dir: &Path) -> Result<Self, RenderError> {
        let read = |mode: Mode| {
            let path = dir.join(mode.template_name());
            fs::read_to_string(&path).map_err(|source| RenderError::Load { path, source })
        };
        let renderer = Self::with_sources(read(Mode::View)?, read(Mode::Edit)?)?;
        tracing::info!(dir = %dir.display(), "loaded page templates");
        Ok(renderer)
    }

    fn with_sources(view: String, edit: String) -> Result<Self, RenderError> {
        let mut env = Environment::new();
        for (mode, source) in [(Mode::View, view), (Mode::Edit, edit)] {
            let name = mode.template_name();
            env.add_template_owned(name, source)
                .map_err(|source| RenderError::Template { name, source })?;
        }
        let renderer = Self { env };

        // Syntax is checked above; a dry run also catches errors that only
        // show up while evaluating (bad filters, failed tests).
        let sample = Page::empty(PageName::trusted("Sample"));
        renderer.render(Mode::View, &sample)?;
        renderer.render(Mode::Edit, &sample)?;
        Ok(renderer)
    }

    /// Renders `page` with the layout for `mode`.
    pub fn render(&self, mode: Mode, page: &Page) -> Result<Vec<u8>, RenderError> {
        let name = mode.template_name();
        let failed = |source| RenderError::Template { name, source };

        let html = self
            .env
            .get_template(name)
            .map_err(failed)?
            .render(context! {
                title => page.name.as_str(),
                body => String::from_utf8_lossy(&page.body),
            })
            .map_err(failed)?;
        Ok(html.into_bytes())
    }
}
