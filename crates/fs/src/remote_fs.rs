//! Filesystem adapter over a remote repository
//!
//! Answers path-based filesystem operations from the attribute and directory
//! caches, falling back to the remote repository on a miss. File content is
//! never cached; every read goes to the service.
//!
//! Paths that failed an attribute lookup are remembered as missing and
//! answered with ENOENT without a round-trip, until the negative TTL runs out
//! or a directory listing reports them again.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use moka::sync::Cache;

use common::remote::{RemoteClient, RemoteError, Repository};

use crate::attr::{DirEntry, DirListing, PathAttr, RequestContext};
use crate::cache::{AttrCache, CacheConfig, CacheStats, DirCache, Fetch};
use crate::config::Config;
use crate::error::FsError;
use crate::paths;

pub struct RemoteFs<R: Repository> {
    client: Arc<R>,
    attrs: AttrCache,
    dirs: DirCache,
    /// Negative cache: paths confirmed absent
    missing: Cache<String, ()>,
    config: CacheConfig,
}

impl RemoteFs<RemoteClient> {
    /// Log on to the remote repository described by `config`
    pub async fn connect(config: &Config) -> Result<Self, FsError> {
        let client = RemoteClient::connect(&config.remote).await?;
        Ok(Self::new(Arc::new(client), config.cache.clone()))
    }
}

impl<R: Repository> RemoteFs<R> {
    pub fn new(client: Arc<R>, config: CacheConfig) -> Self {
        Self {
            client,
            attrs: AttrCache::new(config.ttl()),
            dirs: DirCache::new(config.ttl()),
            missing: Cache::builder()
                .time_to_live(config.negative_ttl())
                .max_capacity(10_000)
                .build(),
            config,
        }
    }

    pub fn client(&self) -> &Arc<R> {
        &self.client
    }

    pub fn attr_cache(&self) -> &AttrCache {
        &self.attrs
    }

    pub fn dir_cache(&self) -> &DirCache {
        &self.dirs
    }

    /// Attributes of `path`, owner and group filled from `ctx` when unset
    pub async fn get_attributes(
        &self,
        path: &str,
        ctx: &RequestContext,
    ) -> Result<PathAttr, FsError> {
        let path = paths::normalize(path);
        if self.is_known_missing(&path) {
            tracing::trace!(%path, "known missing");
            return Err(FsError::NotFound(path));
        }

        let provider = StatProvider { fs: self, ctx };
        match self.attrs.get(&path, &provider).await {
            Ok(attr) => Ok(attr.with_owner(ctx)),
            Err(err) => {
                tracing::debug!(%path, error = %err, "getattr failed, remembering as missing");
                self.missing.insert(path.clone(), ());
                Err(FsError::NotFound(path))
            }
        }
    }

    /// Listing of the directory at `path`
    pub async fn read_dir(
        &self,
        path: &str,
        ctx: &RequestContext,
    ) -> Result<Arc<DirListing>, FsError> {
        let path = paths::normalize(path);
        let provider = ListingProvider { fs: self, ctx };
        self.dirs.get(&path, &provider).await.map_err(|err| {
            tracing::debug!(%path, error = %err, "readdir failed");
            FsError::NotFound(path.clone())
        })
    }

    /// Call `emit` once per child of `path`, in the order the service listed them
    pub async fn list_directory<F>(
        &self,
        path: &str,
        ctx: &RequestContext,
        mut emit: F,
    ) -> Result<(), FsError>
    where
        F: FnMut(&str, &PathAttr),
    {
        let listing = self.read_dir(path, ctx).await?;
        for entry in &listing.entries {
            emit(&entry.name, &entry.attr);
        }
        Ok(())
    }

    /// Copy content of `path` starting at `offset` into `buf`, returning the
    /// number of bytes copied. Always fetches fresh content.
    pub async fn read_data(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        let path = paths::normalize(path);
        let content = self.client.read_file(&path).await?;
        let copied = copy_range(&content, buf, offset);
        tracing::trace!(%path, offset, copied, len = content.len(), "read");
        Ok(copied)
    }

    /// No per-handle state is kept; every read re-resolves the path
    pub fn open(&self, path: &str) -> Result<u64, FsError> {
        tracing::trace!(path, "open");
        Ok(0)
    }

    pub fn release(&self, path: &str, fh: u64) -> Result<(), FsError> {
        tracing::trace!(path, fh, "release");
        Ok(())
    }

    pub fn set_flags(&self, path: &str, flags: u32) -> Result<(), FsError> {
        tracing::trace!(path, flags, "chflags ignored");
        Ok(())
    }

    pub fn set_crtime(&self, path: &str, _time: SystemTime) -> Result<(), FsError> {
        tracing::trace!(path, "setcrtime ignored");
        Ok(())
    }

    pub fn set_chgtime(&self, path: &str, _time: SystemTime) -> Result<(), FsError> {
        tracing::trace!(path, "setchgtime ignored");
        Ok(())
    }

    pub fn is_known_missing(&self, path: &str) -> bool {
        self.missing.get(&paths::normalize(path)).is_some()
    }

    pub fn stats(&self) -> CacheStats {
        self.missing.run_pending_tasks();
        CacheStats {
            attr_count: self.attrs.entry_count(),
            dir_count: self.dirs.entry_count(),
            missing_count: self.missing.entry_count(),
            ttl_secs: self.config.ttl_secs,
            negative_ttl_secs: self.config.negative_ttl_secs,
            size_probe_concurrency: self.config.size_probe_concurrency,
        }
    }

    /// Content length of a file, or zero if it cannot be read.
    ///
    /// The service does not report sizes, so this costs a full read.
    async fn probe_size(&self, path: &str) -> u64 {
        match self.client.read_file(path).await {
            Ok(content) => content.len() as u64,
            Err(err) => {
                tracing::debug!(path, error = %err, "size probe failed");
                0
            }
        }
    }
}

impl<R: Repository> std::fmt::Debug for RemoteFs<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFs")
            .field("config", &self.config)
            .field("attrs", &self.attrs)
            .field("dirs", &self.dirs)
            .field("missing_count", &self.missing.entry_count())
            .finish()
    }
}

fn copy_range(content: &[u8], buf: &mut [u8], offset: u64) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= content.len() {
        return 0;
    }
    let end = start.saturating_add(buf.len()).min(content.len());
    let copied = end - start;
    buf[..copied].copy_from_slice(&content[start..end]);
    copied
}

/// Fills the attribute cache from a stat call
struct StatProvider<'a, R: Repository> {
    fs: &'a RemoteFs<R>,
    ctx: &'a RequestContext,
}

#[async_trait]
impl<R: Repository> Fetch<PathAttr> for StatProvider<'_, R> {
    type Error = RemoteError;

    async fn fetch(&self, path: &str) -> Result<PathAttr, RemoteError> {
        let stat = self.fs.client.stat(path).await?;
        let mut attr = PathAttr::from_stat(&stat, self.ctx);
        if attr.is_file() && attr.size == 0 {
            attr.size = self.fs.probe_size(path).await;
        }
        Ok(attr)
    }
}

/// Fills the directory cache from a listing and seeds the attribute cache
/// with every child it finds
struct ListingProvider<'a, R: Repository> {
    fs: &'a RemoteFs<R>,
    ctx: &'a RequestContext,
}

#[async_trait]
impl<R: Repository> Fetch<Arc<DirListing>> for ListingProvider<'_, R> {
    type Error = RemoteError;

    async fn fetch(&self, path: &str) -> Result<Arc<DirListing>, RemoteError> {
        let detail = self.fs.client.read_directory(path).await?;

        let children: Vec<_> = detail
            .children
            .into_iter()
            .filter(|child| {
                let keep = paths::is_leaf_name(&child.name);
                if !keep {
                    tracing::warn!(
                        dir = path,
                        name = %child.name,
                        "dropping listing entry that is not a direct child"
                    );
                }
                keep
            })
            .collect();

        let fs = self.fs;
        let ctx = self.ctx;
        let entries: Vec<(String, DirEntry)> = stream::iter(children)
            .map(|child| async move {
                let child_path = paths::join(path, &child.name);
                let mut attr = PathAttr::from_child(&child, ctx);
                if attr.is_file() && attr.size == 0 {
                    attr.size = fs.probe_size(&child_path).await;
                }
                let entry = DirEntry {
                    name: child.name,
                    attr,
                };
                (child_path, entry)
            })
            .buffered(fs.config.size_probe_concurrency.max(1))
            .collect()
            .await;

        for (child_path, entry) in &entries {
            fs.attrs.preload(child_path, entry.attr.clone());
            fs.missing.invalidate(child_path);
        }

        tracing::debug!(dir = path, children = entries.len(), "listed directory");
        Ok(Arc::new(DirListing {
            path: path.to_string(),
            entries: entries.into_iter().map(|(_, entry)| entry).collect(),
        }))
    }
}
