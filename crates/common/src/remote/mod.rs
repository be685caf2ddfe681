//! Remote access client
//!
//! # Protocol
//!
//! - `GET  <base>/file<path>?depth=0&parts=meta`: metadata of one path
//! - `GET  <base>/file<path>?depth=1`: directory listing
//! - `GET  <base>/file<path>`: file content
//! - `HEAD <base>/info` with `x-csrf-token: fetch`: security token handshake

mod client;
mod config;
mod error;
mod types;

pub use client::{RemoteClient, Repository, CSRF_TOKEN_HEADER};
pub use config::{RemoteConfig, DEFAULT_BASE_PATH};
pub use error::{CredentialError, RemoteError};
pub use types::{
    BackPack, DirectoryChild, DirectoryDetail, DirectoryMeta, FileAttributes, FileMeta,
    NodeAttributes, PathStat,
};
