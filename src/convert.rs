//! Defines the [`Converter`] trait which turns a source document on disk into
//! the body published to the remote site, plus the default
//! [`NotebookConverter`] implementation.

use crate::markdown;
use crate::notebook::Notebook;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const NOTEBOOK_EXTENSION: &str = "ipynb";
pub const MARKDOWN_EXTENSION: &str = "md";

/// The rendered body format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Html,
    Markdown,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Format, String> {
        match s {
            "html" => Ok(Format::Html),
            "markdown" | "md" => Ok(Format::Markdown),
            _ => Err(format!("unknown format `{}`", s)),
        }
    }
}

/// Converts a source document into a rendered body. Implementations must be
/// deterministic: the same file contents always produce the same body.
pub trait Converter {
    fn convert(&self, path: &Path) -> Result<String>;
}

/// Converts notebooks (`.ipynb`) and markdown documents (`.md`).
pub struct NotebookConverter {
    pub format: Format,
}

impl NotebookConverter {
    pub fn new(format: Format) -> NotebookConverter {
        NotebookConverter { format }
    }

    /// Renders a document to markdown regardless of [`NotebookConverter::format`].
    pub fn to_markdown(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            return Err(Error::Missing(path.to_owned()));
        }
        let extension = path.extension().and_then(|e| e.to_str());
        match extension {
            Some(NOTEBOOK_EXTENSION) => {
                let notebook = Notebook::from_str(&read(path)?).map_err(|err| Error::Notebook {
                    path: path.to_owned(),
                    err,
                })?;
                Ok(notebook.to_markdown())
            }
            Some(MARKDOWN_EXTENSION) => read(path),
            _ => Err(Error::Unsupported(path.to_owned())),
        }
    }
}

impl Converter for NotebookConverter {
    fn convert(&self, path: &Path) -> Result<String> {
        let markdown = self.to_markdown(path)?;
        Ok(match self.format {
            Format::Html => markdown::to_html(&markdown),
            Format::Markdown => markdown,
        })
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| Error::Io {
        path: path.to_owned(),
        err,
    })
}

/// Represents the result of a conversion.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a source document that couldn't be read or converted. These
/// errors are recoverable: the item is skipped and reported.
#[derive(Debug)]
pub enum Error {
    /// Returned when a referenced document doesn't exist.
    Missing(PathBuf),

    /// Returned when the document can't be read.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when a notebook isn't valid nbformat JSON.
    Notebook {
        path: PathBuf,
        err: serde_json::Error,
    },

    /// Returned for documents with an extension we don't convert.
    Unsupported(PathBuf),

    /// Returned when a body template fails to render for a document.
    Template { path: PathBuf, err: String },
}

impl Error {
    /// The path of the offending document.
    pub fn path(&self) -> &Path {
        match self {
            Error::Missing(path) => path,
            Error::Io { path, .. } => path,
            Error::Notebook { path, .. } => path,
            Error::Unsupported(path) => path,
            Error::Template { path, .. } => path,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Missing(path) => {
                write!(f, "document not found: '{}'", path.display())
            }
            Error::Io { path, err } => {
                write!(f, "reading '{}': {}", path.display(), err)
            }
            Error::Notebook { path, err } => {
                write!(f, "parsing notebook '{}': {}", path.display(), err)
            }
            Error::Unsupported(path) => {
                write!(f, "unsupported document type: '{}'", path.display())
            }
            Error::Template { path, err } => {
                write!(f, "rendering body for '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Missing(_) => None,
            Error::Io { err, .. } => Some(err),
            Error::Notebook { err, .. } => Some(err),
            Error::Unsupported(_) => None,
            Error::Template { .. } => None,
        }
    }
}
