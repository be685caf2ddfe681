//! FUSE mounting for a remote repository
//!
//! - `HanaFuse`: `fuser` filesystem forwarding to [`crate::RemoteFs`]
//! - `InodeTable`: inode ↔ path mapping
//!
//! The mount is read-only; content writes are refused by the kernel and
//! metadata updates are accepted without effect.

mod filesystem;
mod inode_table;

pub use filesystem::{to_file_attr, HanaFuse};
pub use inode_table::InodeTable;
