//! Exports the [`Publisher`] which walks a directory of notebooks and mirrors it
//! onto the remote site. Each folder becomes a parent resource (a page, or a
//! category in posts mode) and each notebook inside it becomes a child (a
//! child page, or a post in that category).
//!
//! Publishing is sequential and best-effort: a folder is always upserted before
//! any of its notebooks, and a failure on one item is recorded in the
//! [`Report`] without stopping the rest of the run.

use crate::config::{self, Config, Mode, Options, Site};
use crate::convert::{self, Converter, NotebookConverter, NOTEBOOK_EXTENSION};
use crate::remote::{self, Client, HttpTransport, Kind, Transport, Upserted};
use crate::template::FolderTemplate;
use crate::title::{title_from_folder, title_from_path};
use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const README_MARKDOWN: &str = "README.md";
const README_HTML: &str = "README.html";

/// Publishes a directory tree through a [`Transport`], converting documents
/// with a [`Converter`].
pub struct Publisher<T, C> {
    client: Client<T>,
    converter: C,
    options: Options,
    folder_template: FolderTemplate,
}

impl Publisher<HttpTransport, NotebookConverter> {
    /// Builds a publisher that talks to the site over HTTP. No request is made
    /// until [`Publisher::traverse`] or [`Publisher::upsert`] is called.
    pub fn new(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.site, config.options.timeout)?;
        Publisher::with_parts(
            transport,
            NotebookConverter::new(config.options.format),
            config.options.clone(),
        )
    }

    /// Builds a publisher from credentials looked up by variable name (see
    /// [`Site::from_lookup`]).
    pub fn from_lookup<F>(lookup: F, options: Options) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Publisher::new(&Config {
            site: Site::from_lookup(lookup)?,
            options,
        })
    }

    /// Builds a publisher from `WP_URL`, `WP_USERNAME` and `WP_PASSWORD`.
    pub fn from_env(options: Options) -> Result<Self> {
        Publisher::from_lookup(|name| std::env::var(name).ok(), options)
    }
}

impl<T: Transport, C: Converter> Publisher<T, C> {
    pub fn with_parts(transport: T, converter: C, options: Options) -> Result<Self> {
        let folder_template = FolderTemplate::new(&options.folder_template).map_err(|err| {
            config::Error::InvalidValue {
                name: "folder_template",
                value: err,
            }
        })?;
        Ok(Publisher {
            client: Client::new(transport, &options.status),
            converter,
            options,
            folder_template,
        })
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Creates or updates a single resource. See [`Client::upsert`].
    pub fn upsert(
        &self,
        kind: Kind,
        title: &str,
        body: &str,
        link: Option<u64>,
    ) -> remote::Result<Upserted> {
        self.client.upsert(kind, title, body, link)
    }

    /// The kinds used for folders and for the notebooks inside them.
    fn kinds(&self) -> (Kind, Kind) {
        match self.options.mode {
            Mode::Pages => (Kind::Page, Kind::Page),
            Mode::Posts => (Kind::Category, Kind::Post),
        }
    }

    /// Publishes every folder directly beneath `root` (and, when
    /// [`Options::recursive`] is set, every folder beneath those). Files
    /// directly in `root` are not published since they have no folder to
    /// belong to.
    ///
    /// Only a missing `root` fails the call. Everything else, including a
    /// folder that can't be listed, is recorded in the returned [`Report`].
    pub fn traverse(&self, root: &Path) -> Result<Report> {
        if !root.is_dir() {
            return Err(Error::MissingRoot(root.to_owned()));
        }
        info!("Processing notebooks from: {}", root.display());

        let mut report = Report::default();
        for dir in subdirectories(root)? {
            self.publish_folder(&dir, None, &mut report);
        }
        Ok(report)
    }

    fn publish_folder(&self, dir: &Path, parent: Option<u64>, report: &mut Report) {
        let (folder_kind, document_kind) = self.kinds();
        let title = match title_from_folder(dir) {
            Some(title) => title,
            None => {
                let err = Error::InvalidFileName(dir.to_owned());
                report.record(dir, String::new(), folder_kind, Err(err));
                return;
            }
        };
        info!("Processing folder: {}", dir.display());

        let folder = self
            .folder_body(dir, &title)
            .and_then(|body| Ok(self.client.upsert(folder_kind, &title, &body, parent)?));
        let folder_id = match folder {
            Ok(upserted) => {
                report.record(dir, title, folder_kind, Ok(upserted));
                upserted.id()
            }
            Err(err) => {
                warn!(
                    "Failed to publish folder {}: {}; skipping its contents",
                    dir.display(),
                    err
                );
                report.record(dir, title, folder_kind, Err(err));
                return;
            }
        };

        match documents(dir) {
            Ok(paths) => {
                for path in paths {
                    self.publish_document(&path, document_kind, folder_id, report);
                }
            }
            Err(err) => {
                warn!("Failed to list {}: {}", dir.display(), err);
                report.record(dir, title_of(dir), document_kind, Err(err));
            }
        }

        if self.options.recursive {
            match subdirectories(dir) {
                Ok(dirs) => {
                    for nested in dirs {
                        self.publish_folder(&nested, Some(folder_id), report);
                    }
                }
                Err(err) => {
                    warn!("Failed to list {}: {}", dir.display(), err);
                    report.record(dir, title_of(dir), folder_kind, Err(err));
                }
            }
        }
    }

    fn publish_document(&self, path: &Path, kind: Kind, parent: u64, report: &mut Report) {
        let title = match title_from_path(path) {
            Some(title) => title,
            None => {
                let err = Error::InvalidFileName(path.to_owned());
                report.record(path, String::new(), kind, Err(err));
                return;
            }
        };

        let result = self
            .converter
            .convert(path)
            .map_err(Error::from)
            .and_then(|body| Ok(self.client.upsert(kind, &title, &body, Some(parent))?));
        match &result {
            Ok(_) => info!("Published notebook: {}", title),
            Err(err) => warn!("Failed to process {}: {}", path.display(), err),
        }
        report.record(path, title, kind, result);
    }

    /// The body for a folder: its `README.md` converted, its `README.html`
    /// verbatim, or the rendered folder template.
    fn folder_body(&self, dir: &Path, title: &str) -> Result<String> {
        let markdown = dir.join(README_MARKDOWN);
        if markdown.is_file() {
            info!("Found {} for folder: {}", README_MARKDOWN, title);
            return Ok(self.converter.convert(&markdown)?);
        }

        let html = dir.join(README_HTML);
        if html.is_file() {
            info!("Found {} for folder: {}", README_HTML, title);
            return std::fs::read_to_string(&html)
                .map_err(|err| Error::Content(convert::Error::Io { path: html, err }));
        }

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("No README found, using default content for: {}", title);
        self.folder_template.render(title, &name).map_err(|err| {
            Error::Content(convert::Error::Template {
                path: dir.to_owned(),
                err,
            })
        })
    }
}

fn title_of(dir: &Path) -> String {
    title_from_folder(dir).unwrap_or_default()
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Lists the immediate entries of `dir` in file-name order, skipping hidden
/// entries such as `.ipynb_checkpoints`. Symlinks are resolved, so a linked
/// folder is published like any other.
fn entries(dir: &Path) -> Result<Vec<walkdir::DirEntry>> {
    WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .map(|entry| entry.map_err(Error::from))
        .collect()
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(entries(dir)?
        .into_iter()
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect())
}

fn documents(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(entries(dir)?
        .into_iter()
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map_or(false, |ext| ext == NOTEBOOK_EXTENSION))
        .collect())
}

/// The result of publishing one folder or notebook.
#[derive(Debug)]
pub struct Outcome {
    pub path: PathBuf,
    pub title: String,
    pub kind: Kind,
    pub result: Result<Upserted>,
}

/// Every outcome of a [`Publisher::traverse`] call, in processing order.
#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
}

impl Report {
    fn record(&mut self, path: &Path, title: String, kind: Kind, result: Result<Upserted>) {
        self.outcomes.push(Outcome {
            path: path.to_owned(),
            title,
            kind,
            result,
        });
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn created(&self) -> usize {
        self.succeeded()
            .filter(|o| matches!(o.result, Ok(Upserted::Created(_))))
            .count()
    }

    pub fn updated(&self) -> usize {
        self.succeeded()
            .filter(|o| matches!(o.result, Ok(Upserted::Updated(_))))
            .count()
    }

    /// True when every item was published.
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Represents the result of a publishing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for publishing. Configuration errors and a missing root
/// directory are fatal; the others are recorded per item in a [`Report`].
#[derive(Debug)]
pub enum Error {
    /// Returned when configuration is missing or malformed.
    Config(config::Error),

    /// Returned when a document can't be read or converted.
    Content(convert::Error),

    /// Returned when the remote site rejects a request.
    Remote(remote::Error),

    /// Returned when the root directory doesn't exist.
    MissingRoot(PathBuf),

    /// Returned when a file or folder name isn't valid UTF-8.
    InvalidFileName(PathBuf),

    /// Returned for WalkDir I/O errors.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
            Error::Content(err) => err.fmt(f),
            Error::Remote(err) => err.fmt(f),
            Error::MissingRoot(path) => {
                write!(f, "notebooks directory not found: '{}'", path.display())
            }
            Error::InvalidFileName(path) => write!(f, "invalid file name: {:?}", path),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Content(err) => Some(err),
            Error::Remote(err) => Some(err),
            Error::MissingRoot(_) => None,
            Error::InvalidFileName(_) => None,
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<config::Error> for Error {
    /// Converts a [`config::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}

impl From<convert::Error> for Error {
    /// Converts a [`convert::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: convert::Error) -> Error {
        Error::Content(err)
    }
}

impl From<remote::Error> for Error {
    /// Converts a [`remote::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: remote::Error) -> Error {
        Error::Remote(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
