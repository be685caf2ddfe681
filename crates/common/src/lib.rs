//! Protocol layer for hanafs.
//!
//! Talks to the HANA XS design-time file API over HTTP: authenticated reads of
//! file content, directory listings and path metadata, with the security token
//! handshake handled transparently.

pub mod remote;

pub use remote::{
    CredentialError, DirectoryChild, DirectoryDetail, PathStat, RemoteClient, RemoteConfig,
    RemoteError, Repository,
};
