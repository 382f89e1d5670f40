//! Talks to the site's REST API. [`Transport`] is the seam between the
//! publishing logic and the network: [`HttpTransport`] is the real
//! implementation, and tests substitute an in-memory store. [`Client`] builds
//! the idempotent [`Client::upsert`] operation on top of any transport.

use crate::config::Site;
use crate::title::slugify;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use url::Url;

/// The path of the REST API relative to the site's base URL.
pub const API_PATH: &str = "wp-json/wp/v2/";

/// Issues requests against collection endpoints. Paths are relative to the
/// API root (e.g. `pages` or `pages/12`). Any non-success response must be
/// returned as [`Error::Status`].
pub trait Transport {
    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value>;
    fn post(&self, path: &str, body: &Value) -> Result<Value>;
}

/// A [`Transport`] over blocking HTTP. Basic authentication is attached to
/// every request.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    api_root: Url,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(site: &Site, timeout: Option<Duration>) -> Result<HttpTransport> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(HttpTransport {
            client: builder.build()?,
            api_root: api_root(&site.url)?,
            username: site.username.clone(),
            password: site.password.clone(),
        })
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Value> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.send(self.client.get(self.api_root.join(path)?).query(query))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.client.post(self.api_root.join(path)?).json(body))
    }
}

/// Resolves the API root for a site. Sites installed below a sub-path (e.g.
/// `https://example.org/blog`) keep that path.
pub fn api_root(site_url: &Url) -> Result<Url> {
    let mut base = site_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(API_PATH)?)
}

/// The remote resource kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Page,
    Post,
    Category,
}

impl Kind {
    /// The collection endpoint, relative to the API root.
    pub fn collection(self) -> &'static str {
        match self {
            Kind::Page => "pages",
            Kind::Post => "posts",
            Kind::Category => "categories",
        }
    }

    /// Whether slugs are scoped to a parent. Post slugs and category slugs
    /// are unique across the whole site, so those are looked up by slug alone.
    pub fn scoped_by_parent(self) -> bool {
        match self {
            Kind::Page => true,
            Kind::Post | Kind::Category => false,
        }
    }

    /// Whether the resource has a publication status. Lookups on these
    /// collections only see published items unless asked for every status.
    pub fn has_status(self) -> bool {
        match self {
            Kind::Page | Kind::Post => true,
            Kind::Category => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Kind::Page => "page",
            Kind::Post => "post",
            Kind::Category => "category",
        })
    }
}

/// The outcome of an upsert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upserted {
    Created(u64),
    Updated(u64),
}

impl Upserted {
    /// The remote ID, which is what children link to.
    pub fn id(self) -> u64 {
        match self {
            Upserted::Created(id) | Upserted::Updated(id) => id,
        }
    }
}

#[derive(Deserialize)]
struct Resource {
    id: u64,
}

/// Creates and updates remote resources through a [`Transport`].
pub struct Client<T> {
    transport: T,

    /// The status applied to every page and post (`publish`, `draft`, ...).
    status: String,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, status: &str) -> Client<T> {
        Client {
            transport,
            status: status.to_owned(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Creates or updates the resource whose slug derives from `title`.
    ///
    /// `link` is the parent ID for pages and categories and the category ID
    /// for posts. Page lookups are scoped to `link` (or to the top level, when
    /// there is none), so the same title under different parents resolves to
    /// different pages. Categories and posts are keyed by slug alone; a
    /// matching category is moved under `link`. Pages and posts are found
    /// whatever their status, so drafts are updated rather than duplicated.
    ///
    /// If exactly one resource matches it is updated in place; otherwise a new
    /// one is created. Either way the returned ID is stable across repeated
    /// calls with the same `title` and `link`.
    pub fn upsert(
        &self,
        kind: Kind,
        title: &str,
        body: &str,
        link: Option<u64>,
    ) -> Result<Upserted> {
        let slug = slugify(title);
        if slug.is_empty() {
            return Err(Error::InvalidTitle(title.to_owned()));
        }

        let existing = self
            .lookup(kind, &slug, link)
            .map_err(|e| e.annotate(format!("looking up {} `{}`", kind, title)))?;
        if existing.len() > 1 {
            warn!(
                "Found {} {} resources with slug `{}`; creating a new one",
                existing.len(),
                kind,
                slug
            );
        }

        match existing.as_slice() {
            [found] => {
                let path = format!("{}/{}", kind.collection(), found.id);
                self.transport
                    .post(&path, &self.payload(kind, title, body, link, None))
                    .map_err(|e| e.annotate(format!("updating {} `{}`", kind, title)))?;
                info!("Updated {}: {} (ID: {})", kind, title, found.id);
                Ok(Upserted::Updated(found.id))
            }
            _ => {
                let created = self
                    .transport
                    .post(
                        kind.collection(),
                        &self.payload(kind, title, body, link, Some(&slug)),
                    )
                    .and_then(|response| Ok(serde_json::from_value::<Resource>(response)?))
                    .map_err(|e| e.annotate(format!("creating {} `{}`", kind, title)))?;
                info!("Created {}: {} (ID: {})", kind, title, created.id);
                Ok(Upserted::Created(created.id))
            }
        }
    }

    fn lookup(&self, kind: Kind, slug: &str, link: Option<u64>) -> Result<Vec<Resource>> {
        let mut query = vec![("slug", slug.to_owned())];
        if kind.scoped_by_parent() {
            query.push(("parent", link.unwrap_or(0).to_string()));
        }
        if kind.has_status() {
            query.push(("status", String::from("any")));
        }
        debug!("Looking up {} with {:?}", kind, query);
        Ok(serde_json::from_value(
            self.transport.get(kind.collection(), &query)?,
        )?)
    }

    fn payload(
        &self,
        kind: Kind,
        title: &str,
        body: &str,
        link: Option<u64>,
        slug: Option<&str>,
    ) -> Value {
        let mut payload = match kind {
            Kind::Page | Kind::Post => json!({
                "title": title,
                "content": body,
                "status": self.status,
            }),
            Kind::Category => json!({
                "name": title,
                "description": body,
            }),
        };
        if let Value::Object(fields) = &mut payload {
            if let Some(slug) = slug {
                fields.insert("slug".to_owned(), json!(slug));
            }
            match (kind, link) {
                (Kind::Page, Some(id)) => {
                    fields.insert("parent".to_owned(), json!(id));
                }
                // A category found by slug alone may sit under another parent.
                (Kind::Category, id) => {
                    fields.insert("parent".to_owned(), json!(id.unwrap_or(0)));
                }
                (Kind::Post, Some(id)) => {
                    fields.insert("categories".to_owned(), json!([id]));
                }
                (Kind::Page, None) | (Kind::Post, None) => {}
            }
        }
        payload
    }
}

/// Represents the result of a remote operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed remote operation. These errors are recoverable: the
/// item is skipped and reported, and the next run retries it.
#[derive(Debug)]
pub enum Error {
    /// Returned when the server responds with a non-success status.
    Status { status: u16, body: String },

    /// Returned when the request couldn't be sent or the response couldn't be
    /// read.
    Http(reqwest::Error),

    /// Returned when a response body isn't the JSON we expected (e.g. a
    /// created resource without an `id`).
    Decode(serde_json::Error),

    /// Returned when a title has no characters usable in a slug.
    InvalidTitle(String),

    /// Returned when an endpoint URL can't be built.
    UrlParse(url::ParseError),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl Error {
    /// Wraps the error with a description of what was being attempted.
    pub fn annotate(self, annotation: String) -> Error {
        Error::Annotated(annotation, Box::new(self))
    }

    /// The HTTP status of the underlying failure, if the server responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Http(err) => err.status().map(|s| s.as_u16()),
            Error::Annotated(_, err) => err.status(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            Error::Http(err) => err.fmt(f),
            Error::Decode(err) => write!(f, "unexpected response: {}", err),
            Error::InvalidTitle(title) => {
                write!(f, "title `{}` has no characters usable in a slug", title)
            }
            Error::UrlParse(err) => err.fmt(f),
            Error::Annotated(annotation, err) => write!(f, "{}: {}", annotation, err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Status { .. } => None,
            Error::Http(err) => Some(err),
            Error::Decode(err) => Some(err),
            Error::InvalidTitle(_) => None,
            Error::UrlParse(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    /// Converts a [`reqwest::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when sending requests.
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Converts a [`serde_json::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when decoding responses.
    fn from(err: serde_json::Error) -> Error {
        Error::Decode(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{Call, MemoryTransport};

    #[test]
    fn test_api_root() -> Result<()> {
        assert_eq!(
            "https://example.org/wp-json/wp/v2/",
            api_root(&Url::parse("https://example.org")?)?.as_str()
        );
        assert_eq!(
            "https://example.org/blog/wp-json/wp/v2/pages",
            api_root(&Url::parse("https://example.org/blog")?)?
                .join("pages")?
                .as_str()
        );
        Ok(())
    }

    #[test]
    fn test_upsert_creates_when_absent() -> Result<()> {
        let client = Client::new(MemoryTransport::new(), "publish");
        let upserted = client.upsert(Kind::Page, "Topic A", "<p>A</p>", None)?;
        assert!(matches!(upserted, Upserted::Created(_)));

        let calls = client.transport().calls();
        assert_eq!(2, calls.len());
        match &calls[0] {
            Call::Get { path, query } => {
                assert_eq!("pages", path);
                assert!(query.contains(&("slug".to_owned(), "topic-a".to_owned())));
                assert!(query.contains(&("parent".to_owned(), "0".to_owned())));
            }
            other => panic!("wanted lookup, got {:?}", other),
        }
        match &calls[1] {
            Call::Post { path, body } => {
                assert_eq!("pages", path);
                assert_eq!("topic-a", body["slug"]);
                assert_eq!("publish", body["status"]);
                assert!(body.get("parent").is_none());
            }
            other => panic!("wanted create, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_upsert_updates_existing_id() -> Result<()> {
        let transport = MemoryTransport::new();
        let existing = transport.insert("pages", "my-notebook-title", 0);
        let client = Client::new(transport, "publish");

        let upserted = client.upsert(Kind::Page, "My Notebook Title", "new body", None)?;
        assert_eq!(Upserted::Updated(existing), upserted);
        assert_eq!(0, client.transport().creates());
        assert_eq!(1, client.transport().updates());
        match &client.transport().calls()[1] {
            Call::Post { path, body } => {
                assert_eq!(&format!("pages/{}", existing), path);
                assert_eq!("new body", body["content"]);
                assert!(body.get("slug").is_none());
            }
            other => panic!("wanted update, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_upsert_is_stable_across_calls() -> Result<()> {
        let client = Client::new(MemoryTransport::new(), "publish");
        let first = client.upsert(Kind::Page, "Lesson 1", "v1", Some(7))?;
        let second = client.upsert(Kind::Page, "lesson-1", "v2", Some(7))?;
        assert!(matches!(first, Upserted::Created(_)));
        assert_eq!(Upserted::Updated(first.id()), second);
        assert_eq!(1, client.transport().records("pages").len());
        Ok(())
    }

    #[test]
    fn test_upsert_finds_drafts() -> Result<()> {
        let client = Client::new(MemoryTransport::new(), "draft");
        let first = client.upsert(Kind::Page, "Lesson 1", "v1", Some(7))?;
        let second = client.upsert(Kind::Page, "Lesson 1", "v2", Some(7))?;
        assert!(matches!(first, Upserted::Created(_)));
        assert_eq!(Upserted::Updated(first.id()), second);

        let post = client.upsert(Kind::Post, "Lesson 2", "v1", Some(3))?;
        assert_eq!(
            Upserted::Updated(post.id()),
            client.upsert(Kind::Post, "Lesson 2", "v2", Some(3))?
        );
        match &client.transport().calls()[0] {
            Call::Get { query, .. } => {
                assert!(query.contains(&("status".to_owned(), "any".to_owned())));
            }
            other => panic!("wanted lookup, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_upsert_scopes_pages_by_parent() -> Result<()> {
        let client = Client::new(MemoryTransport::new(), "publish");
        let a = client.upsert(Kind::Page, "Intro", "", Some(1))?;
        let b = client.upsert(Kind::Page, "Intro", "", Some(2))?;
        assert_ne!(a.id(), b.id());
        assert_eq!(2, client.transport().creates());
        Ok(())
    }

    #[test]
    fn test_upsert_post_links_category() -> Result<()> {
        let client = Client::new(MemoryTransport::new(), "draft");
        client.upsert(Kind::Post, "Lesson 1", "body", Some(3))?;
        match &client.transport().calls()[..] {
            [Call::Get { query, .. }, Call::Post { path, body }] => {
                assert!(!query.iter().any(|(k, _)| k == "parent"));
                assert_eq!("posts", path);
                assert_eq!(json!([3]), body["categories"]);
                assert_eq!("draft", body["status"]);
            }
            other => panic!("unexpected calls: {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_upsert_category_payload() -> Result<()> {
        let client = Client::new(MemoryTransport::new(), "publish");
        client.upsert(Kind::Category, "Topic A", "About A", None)?;
        match &client.transport().calls()[1] {
            Call::Post { path, body } => {
                assert_eq!("categories", path);
                assert_eq!("Topic A", body["name"]);
                assert_eq!("About A", body["description"]);
                assert!(body.get("status").is_none());
            }
            other => panic!("wanted create, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_upsert_keys_categories_by_slug() -> Result<()> {
        let client = Client::new(MemoryTransport::new(), "publish");
        let first = client.upsert(Kind::Category, "Intro", "", Some(1))?;
        let second = client.upsert(Kind::Category, "Intro", "", Some(2))?;
        assert_eq!(Upserted::Updated(first.id()), second);

        let categories = client.transport().records("categories");
        assert_eq!(1, categories.len());
        assert_eq!(2, categories[0].parent);
        match &client.transport().calls()[2] {
            Call::Get { query, .. } => {
                assert_eq!(&vec![("slug".to_owned(), "intro".to_owned())], query);
            }
            other => panic!("wanted lookup, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_upsert_surfaces_status_with_title() {
        let transport = MemoryTransport::new();
        transport.fail_on("Broken");
        let client = Client::new(transport, "publish");

        let err = client.upsert(Kind::Page, "Broken", "", None).unwrap_err();
        assert_eq!(Some(500), err.status());
        assert!(err.to_string().starts_with("creating page `Broken`: HTTP 500"));
    }

    #[test]
    fn test_upsert_rejects_empty_slug() {
        let client = Client::new(MemoryTransport::new(), "publish");
        assert!(matches!(
            client.upsert(Kind::Page, "???", "", None),
            Err(Error::InvalidTitle(_))
        ));
        assert!(client.transport().calls().is_empty());
    }
}
