//! An in-memory [`Transport`] for tests. It behaves like a tiny WordPress:
//! lookups filter by `slug` and `parent`, and only see published items unless
//! `status` says otherwise. Posts to a collection create, posts to
//! `{collection}/{id}` update, and category slugs must be unique. Every
//! request is recorded so tests can assert on ordering and on which requests
//! were made.

use crate::remote::{Error, Result, Transport};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashSet;

const CATEGORIES: &str = "categories";
const PUBLISHED: &str = "publish";

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Get {
        path: String,
        query: Vec<(String, String)>,
    },
    Post {
        path: String,
        body: Value,
    },
}

#[derive(Clone, Debug)]
pub struct Record {
    pub collection: String,
    pub id: u64,
    pub slug: String,
    pub parent: u64,

    /// `None` for categories, which have no status.
    pub status: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct MemoryTransport {
    records: RefCell<Vec<Record>>,
    calls: RefCell<Vec<Call>>,
    failing: RefCell<HashSet<String>>,
}

impl MemoryTransport {
    pub fn new() -> MemoryTransport {
        MemoryTransport::default()
    }

    /// Seeds a resource and returns its ID.
    pub fn insert(&self, collection: &str, slug: &str, parent: u64) -> u64 {
        let mut records = self.records.borrow_mut();
        let id = 100 + records.len() as u64;
        records.push(Record {
            collection: collection.to_owned(),
            id,
            slug: slug.to_owned(),
            parent,
            status: match collection {
                CATEGORIES => None,
                _ => Some(String::from(PUBLISHED)),
            },
            body: Value::Null,
        });
        id
    }

    /// Makes creates and updates whose title (or category name) is `title`
    /// fail with a 500.
    pub fn fail_on(&self, title: &str) {
        self.failing.borrow_mut().insert(title.to_owned());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.records
            .borrow()
            .iter()
            .filter(|r| r.collection == collection)
            .cloned()
            .collect()
    }

    pub fn creates(&self) -> usize {
        self.posts().filter(|path| !path.contains('/')).count()
    }

    pub fn updates(&self) -> usize {
        self.posts().filter(|path| path.contains('/')).count()
    }

    fn posts(&self) -> impl Iterator<Item = String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Post { path, .. } => Some(path),
                Call::Get { .. } => None,
            })
    }
}

impl Transport for MemoryTransport {
    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.calls.borrow_mut().push(Call::Get {
            path: path.to_owned(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });

        let param = |name: &str| {
            query
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
        };
        let slug = param("slug");
        let parent = param("parent").and_then(|p| p.parse::<u64>().ok());
        let status = param("status");
        let visible = |record: &Record| match (&record.status, &status) {
            (None, _) => true,
            (Some(current), None) => current == PUBLISHED,
            (Some(_), Some(wanted)) if wanted == "any" => true,
            (Some(current), Some(wanted)) => current == wanted,
        };

        let found: Vec<Value> = self
            .records
            .borrow()
            .iter()
            .filter(|r| r.collection == path)
            .filter(|r| slug.as_ref().map_or(true, |s| *s == r.slug))
            .filter(|r| parent.map_or(true, |p| p == r.parent))
            .filter(|r| visible(*r))
            .map(|r| json!({ "id": r.id, "slug": r.slug, "parent": r.parent }))
            .collect();
        Ok(Value::Array(found))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.calls.borrow_mut().push(Call::Post {
            path: path.to_owned(),
            body: body.clone(),
        });

        let title = body
            .get("title")
            .or_else(|| body.get("name"))
            .and_then(|t| t.as_str())
            .unwrap_or_default();
        if self.failing.borrow().contains(title) {
            return Err(Error::Status {
                status: 500,
                body: String::from("{\"code\":\"internal_error\"}"),
            });
        }

        let mut records = self.records.borrow_mut();
        match path.split_once('/') {
            Some((collection, id)) => {
                let id: u64 = id.parse().unwrap_or_default();
                match records
                    .iter_mut()
                    .find(|r| r.collection == collection && r.id == id)
                {
                    Some(record) => {
                        if let Some(parent) = body["parent"].as_u64() {
                            record.parent = parent;
                        }
                        if let Some(status) = body["status"].as_str() {
                            record.status = Some(status.to_owned());
                        }
                        record.body = body.clone();
                        Ok(json!({ "id": id }))
                    }
                    None => Err(Error::Status {
                        status: 404,
                        body: String::from("{\"code\":\"rest_post_invalid_id\"}"),
                    }),
                }
            }
            None => {
                let slug = body["slug"].as_str().unwrap_or_default();
                if path == CATEGORIES
                    && records
                        .iter()
                        .any(|r| r.collection == CATEGORIES && r.slug == slug)
                {
                    return Err(Error::Status {
                        status: 400,
                        body: String::from("{\"code\":\"term_exists\"}"),
                    });
                }
                let id = 100 + records.len() as u64;
                records.push(Record {
                    collection: path.to_owned(),
                    id,
                    slug: slug.to_owned(),
                    parent: body["parent"].as_u64().unwrap_or_default(),
                    status: body["status"].as_str().map(str::to_owned),
                    body: body.clone(),
                });
                Ok(json!({ "id": id }))
            }
        }
    }
}
