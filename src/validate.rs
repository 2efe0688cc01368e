//! Request-path validation.
//!
//! Every page request path must match one fixed grammar:
//!
//! ```text
//! /(view|edit|save)/<name>      name = [A-Za-z0-9]+
//! ```
//!
//! Nothing else reaches the store. Slashes, dots, percent escapes and
//! non-ASCII letters are all rejected, so a [`PageName`] can be used as a
//! filename stem as-is.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static PAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(view|edit|save)/([A-Za-z0-9]+)$").expect("page path grammar")
});

/// The three page actions.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    View,
    Edit,
    Save,
}

impl Operation {
    /// Returns the path keyword (e.g. `"view"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Save => "save",
        }
    }

    /// Request path for this operation on `name`, e.g. `/edit/Alpha`.
    pub fn path(self, name: &PageName) -> String {
        format!("/{}/{}", self.as_str(), name)
    }
}

/// Parses a lowercase keyword. Case-sensitive, like the path grammar.
impl FromStr for Operation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "save" => Ok(Self::Save),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated page identifier: one or more ASCII letters or digits.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PageName(String);

impl PageName {
    /// Validates a bare identifier against the name half of the grammar.
    pub fn new(name: &str) -> Result<Self, InvalidPath> {
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(name.to_owned()))
        } else {
            Err(InvalidPath { path: name.to_owned() })
        }
    }

    /// For names spelled out in the source. Must satisfy the grammar.
    pub(crate) fn trusted(name: &'static str) -> Self {
        debug_assert!(Self::new(name).is_ok(), "bad page name literal {name:?}");
        Self(name.to_owned())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request path that passed validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PagePath {
    pub operation: Operation,
    pub name: PageName,
}

/// The path did not match the page grammar.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid page path `{path}`")]
pub struct InvalidPath {
    pub path: String,
}

/// Splits `path` into its operation and page name.
///
/// `path` is the URI path only; strip the query string first.
pub fn parse(path: &str) -> Result<PagePath, InvalidPath> {
    let invalid = || InvalidPath { path: path.to_owned() };
    let caps = PAGE_PATH.captures(path).ok_or_else(invalid)?;

    // Both groups are mandatory in the grammar.
    let operation = caps[1].parse().map_err(|()| invalid())?;
    let name = PageName(caps[2].to_owned());
    Ok(PagePath { operation, name })
}
