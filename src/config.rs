//! Defines the [`Config`] object which bundles the validated site credentials
//! ([`Site`]) with the publishing [`Options`]. Credentials come from the
//! environment (`WP_URL`, `WP_USERNAME`, `WP_PASSWORD`); options come from an
//! optional `nbpress.yaml` project file and may be overridden on the command
//! line.

use crate::convert::Format;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// The name of the project file searched for by [`Options::from_directory`].
pub const PROJECT_FILE: &str = "nbpress.yaml";

pub const URL_VAR: &str = "WP_URL";
pub const USERNAME_VAR: &str = "WP_USERNAME";
pub const PASSWORD_VAR: &str = "WP_PASSWORD";

/// The template for folder bodies when the folder has no README.
pub const DEFAULT_FOLDER_TEMPLATE: &str =
    "<h1>{{ .title }}</h1>\n<p>Collection of notebooks in the {{ .name }} category.</p>";

/// Everything a [`crate::publish::Publisher`] needs to run.
pub struct Config {
    pub site: Site,
    pub options: Options,
}

/// Validated connection details for the remote site. A [`Site`] can only be
/// constructed through [`Site::new`] (or its environment wrappers), so holding
/// one means the base URL and both credentials have been checked.
#[derive(Clone)]
pub struct Site {
    /// The base URL of the site, e.g. `https://example.org`.
    pub url: Url,
    pub username: String,
    pub password: String,
}

impl Site {
    /// Validates the three connection values. Empty values count as missing.
    pub fn new(url: &str, username: &str, password: &str) -> Result<Site> {
        let url = required(URL_VAR, url)?;
        let username = required(USERNAME_VAR, username)?;
        let password = required(PASSWORD_VAR, password)?;

        let parsed = Url::parse(url).map_err(|err| Error::InvalidUrl {
            url: url.to_owned(),
            err,
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(Site {
                url: parsed,
                username: username.to_owned(),
                password: password.to_owned(),
            }),
            _ => Err(Error::UnsupportedScheme(url.to_owned())),
        }
    }

    /// Loads the site from the process environment.
    pub fn from_env() -> Result<Site> {
        Site::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the site from an arbitrary variable lookup. Each variable must be
    /// present and non-empty.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Site> {
        let fetch = |name: &'static str| lookup(name).ok_or(Error::Missing(name));
        let url = fetch(URL_VAR)?;
        let username = fetch(USERNAME_VAR)?;
        let password = fetch(PASSWORD_VAR)?;
        Site::new(&url, &username, &password)
    }
}

impl fmt::Debug for Site {
    /// Formats a [`Site`] without leaking the password.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Site")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .finish()
    }
}

fn required<'a>(name: &'static str, value: &'a str) -> Result<&'a str> {
    match value.trim() {
        "" => Err(Error::Missing(name)),
        trimmed => Ok(trimmed),
    }
}

/// Whether folders become parent pages (with notebooks as child pages) or
/// categories (with notebooks as posts in that category).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Pages,
    Posts,
}

impl std::str::FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Mode> {
        match s {
            "pages" => Ok(Mode::Pages),
            "posts" => Ok(Mode::Posts),
            _ => Err(Error::InvalidValue {
                name: "kind",
                value: s.to_owned(),
            }),
        }
    }
}

/// Publishing options. These never contain secrets and may be checked into a
/// project file.
#[derive(Clone, Debug)]
pub struct Options {
    pub mode: Mode,

    /// The remote status for every published item (`publish`, `draft`, ...).
    pub status: String,

    /// The rendered body format.
    pub format: Format,

    /// Whether nested folders are published beneath their enclosing folder.
    pub recursive: bool,

    /// The gtmpl template for folders without a README. `.title` and `.name`
    /// are available.
    pub folder_template: String,

    /// The request timeout. `None` keeps the HTTP client default.
    pub timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            mode: Mode::Pages,
            status: String::from("publish"),
            format: Format::Html,
            recursive: false,
            folder_template: String::from(DEFAULT_FOLDER_TEMPLATE),
            timeout: None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct Project {
    kind: Option<Mode>,
    status: Option<String>,
    format: Option<Format>,
    recursive: Option<bool>,
    folder_template: Option<String>,
    timeout_secs: Option<u64>,
}

impl Options {
    /// Searches `dir` and its ancestors for [`PROJECT_FILE`]. If none exists,
    /// the defaults are returned.
    pub fn from_directory(dir: &Path) -> Result<Options> {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_owned());
        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            let path = dir.join(PROJECT_FILE);
            if path.is_file() {
                return Options::from_project_file(&path);
            }
            current = dir.parent();
        }
        Ok(Options::default())
    }

    /// Loads options from a project file. Fields missing from the file keep
    /// their defaults.
    pub fn from_project_file(path: &Path) -> Result<Options> {
        let file = std::fs::File::open(path).map_err(|err| Error::Io {
            path: path.to_owned(),
            err,
        })?;
        let project: Project = serde_yaml::from_reader(file).map_err(|err| Error::Yaml {
            path: path.to_owned(),
            err,
        })?;

        let defaults = Options::default();
        if let Some(status) = &project.status {
            required("status", status)?;
        }
        Ok(Options {
            mode: project.kind.unwrap_or(defaults.mode),
            status: project.status.unwrap_or(defaults.status),
            format: project.format.unwrap_or(defaults.format),
            recursive: project.recursive.unwrap_or(defaults.recursive),
            folder_template: project.folder_template.unwrap_or(defaults.folder_template),
            timeout: project.timeout_secs.map(Duration::from_secs),
        })
    }
}

/// The result of a fallible configuration operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a missing or malformed configuration value. Configuration errors
/// are fatal: they are reported before any work begins.
#[derive(Debug)]
pub enum Error {
    /// Returned when a required value is absent or empty.
    Missing(&'static str),

    /// Returned when the base URL can't be parsed.
    InvalidUrl { url: String, err: url::ParseError },

    /// Returned when the base URL isn't `http://` or `https://`.
    UnsupportedScheme(String),

    /// Returned when an option has an unrecognized value.
    InvalidValue { name: &'static str, value: String },

    /// Returned when the project file isn't valid YAML.
    Yaml { path: PathBuf, err: serde_yaml::Error },

    /// Returned when the project file can't be read.
    Io { path: PathBuf, err: std::io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Missing(name) => {
                write!(f, "`{}` is required but was not set", name)
            }
            Error::InvalidUrl { url, err } => {
                write!(f, "invalid {} `{}`: {}", URL_VAR, url, err)
            }
            Error::UnsupportedScheme(url) => write!(
                f,
                "{} must include http:// or https:// (got `{}`)",
                URL_VAR, url
            ),
            Error::InvalidValue { name, value } => {
                write!(f, "invalid value for `{}`: `{}`", name, value)
            }
            Error::Yaml { path, err } => {
                write!(f, "parsing project file '{}': {}", path.display(), err)
            }
            Error::Io { path, err } => {
                write!(f, "opening project file '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Missing(_) => None,
            Error::InvalidUrl { err, .. } => Some(err),
            Error::UnsupportedScheme(_) => None,
            Error::InvalidValue { .. } => None,
            Error::Yaml { err, .. } => Some(err),
            Error::Io { err, .. } => Some(err),
        }
    }
}
