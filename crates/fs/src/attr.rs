//! Path attribute records and directory listings

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::remote::{DirectoryChild, PathStat};

/// Owner read, write and execute; the repository has no finer permissions
pub const DEFAULT_PERM: u16 = 0o700;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Directory,
}

/// Who is asking, and when. Supplied by the bridging layer on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub uid: u32,
    pub gid: u32,
    pub now: SystemTime,
}

impl RequestContext {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            now: SystemTime::now(),
        }
    }
}

/// POSIX-style metadata for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAttr {
    pub kind: NodeKind,
    pub size: u64,
    pub perm: u16,
    pub uid: u32,
    pub gid: u32,
    pub crtime: SystemTime,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub executable: bool,
    pub read_only: bool,
    pub hidden: bool,
    pub symbolic_link: bool,
    pub activated: bool,
}

impl PathAttr {
    /// Translate a stat document. Size is left at zero for the caller to probe.
    pub fn from_stat(stat: &PathStat, ctx: &RequestContext) -> Self {
        let modified = remote_time(stat.timestamp_ms).unwrap_or(ctx.now);
        Self {
            kind: if stat.directory {
                NodeKind::Directory
            } else {
                NodeKind::File
            },
            size: 0,
            perm: DEFAULT_PERM,
            uid: ctx.uid,
            gid: ctx.gid,
            crtime: modified,
            atime: ctx.now,
            mtime: modified,
            executable: stat.executable,
            read_only: stat.read_only,
            hidden: stat.hidden,
            symbolic_link: stat.symbolic_link,
            activated: stat.activated,
        }
    }

    /// Translate a listing entry, which only knows name and kind
    pub fn from_child(child: &DirectoryChild, ctx: &RequestContext) -> Self {
        Self {
            kind: if child.directory {
                NodeKind::Directory
            } else {
                NodeKind::File
            },
            size: 0,
            perm: DEFAULT_PERM,
            uid: ctx.uid,
            gid: ctx.gid,
            crtime: ctx.now,
            atime: ctx.now,
            mtime: ctx.now,
            executable: false,
            read_only: false,
            hidden: false,
            symbolic_link: false,
            activated: false,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// `st_mode`: file type bits plus permissions
    pub fn mode(&self) -> u32 {
        let kind = match self.kind {
            NodeKind::Directory => libc::S_IFDIR,
            NodeKind::File => libc::S_IFREG,
        };
        kind as u32 | u32::from(self.perm)
    }

    /// Fill owner and group from the caller when the record has none
    pub fn with_owner(mut self, ctx: &RequestContext) -> Self {
        if self.uid == 0 {
            self.uid = ctx.uid;
        }
        if self.gid == 0 {
            self.gid = ctx.gid;
        }
        self
    }
}

fn remote_time(timestamp_ms: i64) -> Option<SystemTime> {
    let ms = u64::try_from(timestamp_ms).ok().filter(|ms| *ms > 0)?;
    UNIX_EPOCH.checked_add(Duration::from_millis(ms))
}

/// One child of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub attr: PathAttr,
}

/// Immediate children of a directory, in the order the service listed them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    pub path: String,
    pub entries: Vec<DirEntry>,
}

impl DirListing {
    pub fn get(&self, name: &str) -> Option<&PathAttr> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.attr)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }
}
