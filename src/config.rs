//! Command-line and environment configuration.
//!
//! Every flag has an environment fallback:
//!
//! | Flag | Env | Default |
//! |---|---|---|
//! | `--addr` | `WIKID_ADDR` | `127.0.0.1:8080` |
//! | `--data-dir` | `WIKID_DATA_DIR` | `.` |
//! | `--templates` | `WIKID_TEMPLATES` | built-in layouts |
//! | `--max-body-bytes` | `WIKID_MAX_BODY_BYTES` | 10 MiB |
//! | `--verbose` | | off |

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::error::Error;
use crate::render::Renderer;
use crate::server::DEFAULT_MAX_BODY_BYTES;
use crate::store::FsStore;
use crate::wiki::Wiki;

/// A file-backed wiki server.
#[derive(Debug, Parser)]
#[command(name = "wikid", version, about)]
pub struct Config {
    /// Address to listen on. `:PORT` listens on all interfaces.
    #[arg(long, env = "WIKID_ADDR", default_value = "127.0.0.1:8080", value_parser = parse_addr)]
    pub addr: SocketAddr,

    /// Directory holding one `{name}.txt` file per page.
    #[arg(long, env = "WIKID_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Directory with `view.html` and `edit.html` overriding the built-in layouts.
    #[arg(long, env = "WIKID_TEMPLATES")]
    pub templates: Option<PathBuf>,

    /// Largest request body accepted; bigger ones get `413`.
    #[arg(long, env = "WIKID_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Log at debug level (otherwise `RUST_LOG`, default info).
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid listen address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Parses `host:port`, or `:port` for all interfaces.
pub fn parse_addr(s: &str) -> Result<SocketAddr, ConfigError> {
    let full = if s.starts_with(':') { format!("0.0.0.0{s}") } else { s.to_owned() };
    full.parse().map_err(|source| ConfigError::Addr { addr: s.to_owned(), source })
}

impl Config {
    /// Opens the page store and compiles the templates.
    ///
    /// Everything that can fail before the first request fails here.
    pub fn open_wiki(&self) -> Result<Wiki, Error> {
        let store = FsStore::open(&self.data_dir)
            .map_err(|source| Error::Store { path: self.data_dir.clone(), source })?;
        let renderer = match &self.templates {
            Some(dir) => Renderer::from_dir(dir)?,
            None => Renderer::new()?,
        };
        Ok(Wiki::new(store, renderer))
    }
}
