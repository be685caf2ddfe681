//! Read-mostly filesystem over a HANA XS design-time repository
//!
//! [`RemoteFs`] answers path-based filesystem calls from time-bounded
//! attribute and directory caches, backed by a [`common::remote::Repository`].
//! With the `fuse` feature, [`fuse::HanaFuse`] mounts it through the kernel.

pub mod attr;
pub mod cache;
pub mod config;
pub mod error;
#[cfg(feature = "fuse")]
pub mod fuse;
pub mod paths;
pub mod remote_fs;

pub use attr::{DirEntry, DirListing, NodeKind, PathAttr, RequestContext};
pub use cache::{AttrCache, CacheConfig, CacheStats, DirCache, Fetch, TtlCache};
pub use config::{Config, ConfigError};
pub use error::FsError;
pub use remote_fs::RemoteFs;
