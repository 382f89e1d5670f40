//! Converts a tree of notebooks into markdown files on disk instead of
//! publishing them. Each notebook `{root}/{folder}/{name}.ipynb` is written to
//! `{out}/{folder}/{name}.md` with YAML frontmatter:
//!
//! ```md
//! ---
//! Title: Lesson 1
//! Date: 2021-04-16
//! Tags:
//!   - topic-a
//! ---
//! # Lesson 1
//! ...
//! ```
//!
//! Notebooks directly in the root land in `uncategorized`.

use crate::convert::{self, NotebookConverter, NOTEBOOK_EXTENSION};
use crate::title::title_from_path;
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Serialize)]
struct Frontmatter<'a> {
    #[serde(rename = "Title")]
    title: &'a str,

    #[serde(rename = "Date")]
    date: String,

    #[serde(rename = "Tags")]
    tags: Vec<&'a str>,
}

/// A notebook that was written out as markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exported {
    pub notebook: PathBuf,
    pub markdown: PathBuf,
    pub category: String,
    pub title: String,
}

/// Exports every notebook beneath `root` into `out_dir`. A notebook that fails
/// to convert or write is reported in the returned list and the export moves
/// on.
pub fn export(
    converter: &NotebookConverter,
    root: &Path,
    out_dir: &Path,
) -> Result<Vec<(PathBuf, Result<Exported>)>> {
    if !root.is_dir() {
        return Err(Error::MissingRoot(root.to_owned()));
    }

    let mut results = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().map_or(true, |ext| ext != NOTEBOOK_EXTENSION)
        {
            continue;
        }

        let result = export_notebook(converter, root, path, out_dir);
        match &result {
            Ok(exported) => info!(
                "Exported {} to {}",
                path.display(),
                exported.markdown.display()
            ),
            Err(err) => warn!("Failed to export {}: {}", path.display(), err),
        }
        results.push((path.to_owned(), result));
    }
    Ok(results)
}

fn export_notebook(
    converter: &NotebookConverter,
    root: &Path,
    notebook: &Path,
    out_dir: &Path,
) -> Result<Exported> {
    let category = category(root, notebook);
    let title = title_from_path(notebook)
        .ok_or_else(|| Error::InvalidFileName(notebook.to_owned()))?;
    let file_name = notebook
        .with_extension("md")
        .file_name()
        .map(|n| n.to_owned())
        .ok_or_else(|| Error::InvalidFileName(notebook.to_owned()))?;

    let body = converter.to_markdown(notebook)?;
    let modified = std::fs::metadata(notebook)
        .and_then(|m| m.modified())
        .map_err(|err| Error::Io {
            path: notebook.to_owned(),
            err,
        })?;
    let frontmatter = serde_yaml::to_string(&Frontmatter {
        title: &title,
        date: chrono::DateTime::<chrono::Local>::from(modified)
            .format("%Y-%m-%d")
            .to_string(),
        tags: vec![category.as_str()],
    })?;

    let dir = out_dir.join(&category);
    let markdown = dir.join(file_name);
    let contents = format!(
        "---\n{}\n---\n{}",
        frontmatter.trim_start_matches("---\n").trim_end(),
        body
    );
    std::fs::create_dir_all(&dir)
        .and_then(|_| std::fs::write(&markdown, contents))
        .map_err(|err| Error::Io {
            path: markdown.clone(),
            err,
        })?;

    Ok(Exported {
        notebook: notebook.to_owned(),
        markdown,
        category,
        title,
    })
}

/// The category of a notebook is the name of its folder, or
/// [`UNCATEGORIZED`] for notebooks directly in `root`.
pub fn category(root: &Path, notebook: &Path) -> String {
    match notebook.parent() {
        Some(parent) if parent != root => parent
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNCATEGORIZED.to_owned()),
        _ => UNCATEGORIZED.to_owned(),
    }
}

/// Represents the result of an export operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error exporting notebooks.
#[derive(Debug)]
pub enum Error {
    /// Returned when the root directory doesn't exist.
    MissingRoot(PathBuf),

    /// Returned when a notebook can't be converted.
    Content(convert::Error),

    /// Returned when the frontmatter can't be serialized.
    Yaml(serde_yaml::Error),

    /// Returned when an output file can't be written.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when a notebook's file name isn't valid UTF-8.
    InvalidFileName(PathBuf),

    /// Returned for WalkDir I/O errors.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingRoot(path) => {
                write!(f, "notebooks directory not found: '{}'", path.display())
            }
            Error::Content(err) => err.fmt(f),
            Error::Yaml(err) => err.fmt(f),
            Error::Io { path, err } => write!(f, "writing '{}': {}", path.display(), err),
            Error::InvalidFileName(path) => write!(f, "invalid file name: {:?}", path),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingRoot(_) => None,
            Error::Content(err) => Some(err),
            Error::Yaml(err) => Some(err),
            Error::Io { err, .. } => Some(err),
            Error::InvalidFileName(_) => None,
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<convert::Error> for Error {
    fn from(err: convert::Error) -> Error {
        Error::Content(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Error {
        Error::Yaml(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
