//! `fuser` filesystem forwarding kernel callbacks to [`RemoteFs`]

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, Request, TimeOrNow,
};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use common::remote::Repository;

use super::inode_table::InodeTable;
use crate::attr::{NodeKind, PathAttr, RequestContext};
use crate::paths;
use crate::remote_fs::RemoteFs;

/// How long the kernel may keep attributes and entries before asking again
const TTL: Duration = Duration::from_secs(1);

const BLOCK_SIZE: u32 = 512;

pub struct HanaFuse<R: Repository> {
    fs: Arc<RemoteFs<R>>,
    runtime: Handle,
    inodes: InodeTable,
}

impl<R: Repository> HanaFuse<R> {
    pub fn new(fs: Arc<RemoteFs<R>>, runtime: Handle) -> Self {
        Self {
            fs,
            runtime,
            inodes: InodeTable::new(),
        }
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    /// Mount read-only at `mountpoint`, blocking until unmounted
    pub fn mount(self, mountpoint: &Path) -> std::io::Result<()> {
        let options = [
            MountOption::RO,
            MountOption::FSName("hanafs".to_string()),
            MountOption::Subtype("hanafs".to_string()),
            MountOption::DefaultPermissions,
        ];
        tracing::info!(mountpoint = %mountpoint.display(), "mounting");
        fuser::mount2(self, mountpoint, &options)
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.inodes.get_path(ino).map(str::to_string)
    }

    fn attributes(&self, path: &str, req: &Request<'_>) -> Result<PathAttr, i32> {
        let ctx = context(req);
        self.runtime
            .block_on(self.fs.get_attributes(path, &ctx))
            .map_err(|err| err.errno())
    }
}

fn context(req: &Request<'_>) -> RequestContext {
    RequestContext::new(req.uid(), req.gid())
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::File => FileType::RegularFile,
    }
}

/// Kernel attribute record for `attr` under inode `ino`
pub fn to_file_attr(ino: u64, attr: &PathAttr) -> FileAttr {
    FileAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.mtime,
        crtime: attr.crtime,
        kind: file_type(attr.kind),
        perm: attr.perm,
        nlink: if attr.is_dir() { 2 } else { 1 },
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

impl<R: Repository> Filesystem for HanaFuse<R> {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str().filter(|name| paths::is_leaf_name(name)) else {
            reply.error(libc::ENOENT);
            return;
        };

        let path = paths::join(&parent_path, name);
        debug!(%path, "lookup");
        match self.attributes(&path, req) {
            Ok(attr) => {
                let ino = self.inodes.get_or_create(&path);
                reply.entry(&TTL, &to_file_attr(ino, &attr), 0);
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.attributes(&path, req) {
            Ok(attr) => reply.attr(&TTL, &to_file_attr(ino, &attr)),
            Err(errno) => reply.error(errno),
        }
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        crtime: Option<SystemTime>,
        chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if size.is_some() {
            reply.error(libc::EROFS);
            return;
        }

        let accepted = [
            flags.map(|flags| self.fs.set_flags(&path, flags)),
            crtime.map(|time| self.fs.set_crtime(&path, time)),
            chgtime.map(|time| self.fs.set_chgtime(&path, time)),
        ];
        if let Some(Err(err)) = accepted.into_iter().flatten().find(Result::is_err) {
            reply.error(err.errno());
            return;
        }

        match self.attributes(&path, req) {
            Ok(attr) => reply.attr(&TTL, &to_file_attr(ino, &attr)),
            Err(errno) => reply.error(errno),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.open(&path) {
            Ok(fh) => reply.opened(fh, 0),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };

        let mut buf = vec![0u8; size as usize];
        match self
            .runtime
            .block_on(self.fs.read_data(&path, &mut buf, offset))
        {
            Ok(copied) => reply.data(&buf[..copied]),
            Err(err) => {
                warn!(%path, offset, error = %err, "read failed");
                reply.error(err.errno());
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let path = self.path_of(ino).unwrap_or_default();
        match self.fs.release(&path, fh) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn opendir(&mut self, req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.attributes(&path, req) {
            Ok(attr) if attr.is_dir() => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOTDIR),
            Err(errno) => reply.error(errno),
        }
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn readdir(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let ctx = context(req);
        let listing = match self.runtime.block_on(self.fs.read_dir(&path, &ctx)) {
            Ok(listing) => listing,
            Err(err) => {
                reply.error(err.errno());
                return;
            }
        };

        let parent = self.inodes.parent_of(ino).unwrap_or(InodeTable::ROOT_INODE);
        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (parent, FileType::Directory, "..".to_string()),
        ];
        for entry in &listing.entries {
            let child = self.inodes.get_or_create(&paths::join(&path, &entry.name));
            entries.push((child, file_type(entry.attr.kind), entry.name.clone()));
        }

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (child, kind, name)) in entries.iter().enumerate().skip(skip) {
            // true once the reply buffer is full
            if reply.add(*child, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }
}
