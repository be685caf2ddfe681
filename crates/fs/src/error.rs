use common::remote::RemoteError;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl FsError {
    /// POSIX error number to hand back to the kernel
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::Remote(err) if err.is_not_found() => libc::ENOENT,
            FsError::Remote(_) => libc::EIO,
        }
    }
}
