//! Inode ↔ path mapping for the kernel bridge
//!
//! The kernel addresses nodes by 64-bit inode while the adapter works on
//! paths. Inodes are handed out on first sight of a path and never reused for
//! the lifetime of the mount, so a stale inode still maps to the path it was
//! issued for.

use std::collections::HashMap;

use crate::paths;

#[derive(Debug)]
pub struct InodeTable {
    path_to_inode: HashMap<String, u64>,
    inode_to_path: HashMap<u64, String>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = 1;

    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            inode_to_path: HashMap::new(),
            next_inode: Self::ROOT_INODE + 1,
        };
        table.path_to_inode.insert("/".to_string(), Self::ROOT_INODE);
        table.inode_to_path.insert(Self::ROOT_INODE, "/".to_string());
        table
    }

    /// Inode for `path`, allocating one if the path has not been seen
    pub fn get_or_create(&mut self, path: &str) -> u64 {
        let key = paths::normalize(path);
        if let Some(&inode) = self.path_to_inode.get(&key) {
            return inode;
        }

        let inode = self.next_inode;
        self.next_inode += 1;
        self.path_to_inode.insert(key.clone(), inode);
        self.inode_to_path.insert(inode, key);
        inode
    }

    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.path_to_inode.get(&paths::normalize(path)).copied()
    }

    pub fn get_path(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(String::as_str)
    }

    /// Inode of the directory containing `inode`; the root is its own parent
    pub fn parent_of(&mut self, inode: u64) -> Option<u64> {
        let parent = paths::parent(self.get_path(inode)?);
        Some(self.get_or_create(&parent))
    }

    pub fn len(&self) -> usize {
        self.inode_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inode_to_path.is_empty()
    }
}
