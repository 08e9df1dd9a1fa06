use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

pub mod memory;

pub use memory::{MemoryDrive, MemoryStore};

/// Byte source for file reads. Boxed so backends can hand out whatever
/// reader they have (in-memory cursor, file, network stream).
pub type DriveStream = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Metadata for a single entry inside a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub is_dir: bool,
    pub size: u64,
}

impl Stat {
    pub fn file(size: u64) -> Self {
        Stat {
            is_dir: false,
            size,
        }
    }

    pub fn dir() -> Self {
        Stat {
            is_dir: true,
            size: 0,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.is_dir
    }
}

/// A directory entry together with its stat, in the order the backing
/// store yields it. Callers must not re-sort; listing output is required
/// to preserve storage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub stat: Stat,
}

/// A versioned, hierarchical content store addressed by a stable key.
///
/// The gateway only borrows handles for the duration of one request and
/// never mutates through them. Implementations must be safe for many
/// concurrent readers. In-drive redirects (links/mounts) are followed by
/// the implementation itself; callers see the resolved target.
#[async_trait]
pub trait Drive: Send + Sync {
    /// The key this drive is addressed by.
    fn key(&self) -> &str;

    /// Monotonic revision counter; increments whenever content changes.
    fn version(&self) -> u64;

    /// Stat a slash-separated path. Empty path means the drive root.
    async fn stat(&self, path: &str) -> io::Result<Stat>;

    /// List a directory, each entry stat'd, in storage order.
    async fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    /// Open a byte stream over `[start, end]` (inclusive) of a file.
    /// `end = None` reads through to the last byte.
    async fn read_stream(
        &self,
        path: &str,
        start: u64,
        end: Option<u64>,
    ) -> io::Result<DriveStream>;
}

/// Capability for turning a drive key into a handle.
///
/// Injected into the gateway so storage backends are swappable without
/// touching resolution logic. `Ok(None)` means the key is unknown.
#[async_trait]
pub trait DriveResolver: Send + Sync {
    async fn resolve_drive(&self, key: &str) -> io::Result<Option<Arc<dyn Drive>>>;
}

/// Normalizes a URL-style path into clean segments: strips empty and `.`
/// segments, resolves `..` within the drive (never above the root).
pub fn normalize_path(path: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_string()),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_empty_and_dot_segments() {
        assert_eq!(normalize_path("a//b/./c/"), vec!["a", "b", "c"]);
        assert!(normalize_path("").is_empty());
        assert!(normalize_path("/").is_empty());
    }

    #[test]
    fn normalize_keeps_dotdot_inside_root() {
        assert_eq!(normalize_path("a/b/../c"), vec!["a", "c"]);
        assert_eq!(normalize_path("../../a"), vec!["a"]);
    }
}
