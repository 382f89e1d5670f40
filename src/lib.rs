//! The library code for `nbpress`, which publishes folders of Jupyter
//! notebooks to a WordPress site. The architecture breaks down into three
//! steps:
//!
//! 1. Walking the source directory ([`crate::publish`])
//! 2. Converting each notebook into a body ([`crate::convert`])
//! 3. Upserting the body into the site ([`crate::remote`])
//!
//! The third step is the one with a contract: every resource is keyed by a
//! slug derived from its title ([`crate::title`]), so publishing the same tree
//! twice updates the resources created the first time instead of duplicating
//! them. Folders become parent pages (or categories) and are always published
//! before the notebooks inside them, which link to the folder's ID.
//!
//! [`crate::export`] offers the conversion step on its own, writing markdown
//! files to disk instead of publishing.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod config;
pub mod convert;
pub mod export;
pub mod markdown;
pub mod notebook;
pub mod publish;
pub mod remote;
pub mod template;
pub mod title;

#[cfg(test)]
mod testing;

pub use config::Error as ConfigError;
pub use convert::Error as ContentError;
pub use remote::Error as RemoteError;
