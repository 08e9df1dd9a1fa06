use std::collections::HashMap;
use std::io::{self, Cursor};
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use super::{DirEntry, Drive, DriveResolver, DriveStream, Stat, normalize_path};

// Link chains longer than this are treated as broken (cycle guard).
const MAX_LINK_HOPS: usize = 32;

#[derive(Debug, Clone)]
enum Node {
    File(Bytes),
    // Insertion-ordered children. Listing output must preserve write order,
    // so this is a Vec of pairs rather than a map.
    Dir(Vec<(String, Node)>),
    // In-drive redirect to an absolute drive path.
    Link(String),
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        match self {
            Node::Dir(children) => children
                .iter()
                .find(|(child_name, _)| child_name == name)
                .map(|(_, node)| node),
            _ => None,
        }
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path))
}

/// Walks `segments` from the root, following link nodes wherever they
/// appear in the chain. Returns the resolved node.
fn resolve_node<'a>(root: &'a Node, segments: &[String], display: &str) -> io::Result<&'a Node> {
    let mut pending: Vec<String> = segments.to_vec();
    let mut current = root;
    let mut hops = 0usize;

    let mut index = 0;
    while index < pending.len() {
        let segment = pending[index].clone();
        let next = current
            .child(&segment)
            .ok_or_else(|| not_found(display))?;
        if let Node::Link(target) = next {
            hops += 1;
            if hops > MAX_LINK_HOPS {
                return Err(io::Error::new(
                    io::ErrorKind::FilesystemLoop,
                    format!("too many links resolving {}", display),
                ));
            }
            // Restart from the root: link target plus the unconsumed tail.
            let mut rerouted = normalize_path(target);
            rerouted.extend(pending[index + 1..].iter().cloned());
            pending = rerouted;
            current = root;
            index = 0;
            continue;
        }
        current = next;
        index += 1;
    }

    Ok(current)
}

/// Inserts `node` at `segments`, creating intermediate directories.
/// Replacing an existing entry keeps its position in the parent, so a
/// rewrite does not shuffle listing order.
fn insert_node(root: &mut Node, segments: &[String], node: Node) -> io::Result<()> {
    let (leaf, parents) = match segments.split_last() {
        Some(split) => split,
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot write to the drive root",
            ));
        }
    };

    let mut current = root;
    for segment in parents {
        let children = match current {
            Node::Dir(children) => children,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{} is not a directory", segment),
                ));
            }
        };
        let position = children
            .iter()
            .position(|(child_name, _)| child_name == segment);
        let index = match position {
            Some(index) => index,
            None => {
                children.push((segment.clone(), Node::Dir(Vec::new())));
                children.len() - 1
            }
        };
        current = &mut children[index].1;
    }

    match current {
        Node::Dir(children) => {
            match children
                .iter_mut()
                .find(|(child_name, _)| child_name == leaf)
            {
                Some((_, existing)) => *existing = node,
                None => children.push((leaf.clone(), node)),
            }
            Ok(())
        }
        _ => Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            "parent is not a directory",
        )),
    }
}

struct Inner {
    root: Node,
    version: u64,
}

/// An in-memory versioned drive.
///
/// A fresh drive starts at revision 1; every write bumps the revision by
/// one. Directory children keep insertion order, and link entries are
/// followed transparently by stat/read operations, so the gateway never
/// sees them.
pub struct MemoryDrive {
    key: String,
    inner: RwLock<Inner>,
}

impl MemoryDrive {
    pub fn new(key: impl Into<String>) -> Self {
        MemoryDrive {
            key: key.into(),
            inner: RwLock::new(Inner {
                root: Node::Dir(Vec::new()),
                version: 1,
            }),
        }
    }

    /// Writes (or replaces) a file, bumping the drive revision.
    pub fn write_file(&self, path: &str, contents: impl Into<Bytes>) -> io::Result<()> {
        let segments = normalize_path(path);
        let mut inner = self.inner.write().expect("drive lock poisoned");
        insert_node(&mut inner.root, &segments, Node::File(contents.into()))?;
        inner.version += 1;
        debug!(key = %self.key, path, version = inner.version, "file written");
        Ok(())
    }

    /// Creates an in-drive link from `path` to the absolute drive path
    /// `target`, bumping the drive revision.
    pub fn symlink(&self, path: &str, target: &str) -> io::Result<()> {
        let segments = normalize_path(path);
        let mut inner = self.inner.write().expect("drive lock poisoned");
        insert_node(&mut inner.root, &segments, Node::Link(target.to_string()))?;
        inner.version += 1;
        Ok(())
    }

    fn stat_of(root: &Node, node: &Node, display: &str) -> io::Result<Stat> {
        match node {
            Node::File(bytes) => Ok(Stat::file(bytes.len() as u64)),
            Node::Dir(_) => Ok(Stat::dir()),
            Node::Link(target) => {
                let target_segments = normalize_path(target);
                let resolved = resolve_node(root, &target_segments, display)?;
                Self::stat_of(root, resolved, display)
            }
        }
    }
}

#[async_trait]
impl Drive for MemoryDrive {
    fn key(&self) -> &str {
        &self.key
    }

    fn version(&self) -> u64 {
        self.inner.read().expect("drive lock poisoned").version
    }

    async fn stat(&self, path: &str) -> io::Result<Stat> {
        let segments = normalize_path(path);
        let inner = self.inner.read().expect("drive lock poisoned");
        let node = resolve_node(&inner.root, &segments, path)?;
        Self::stat_of(&inner.root, node, path)
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let segments = normalize_path(path);
        let inner = self.inner.read().expect("drive lock poisoned");
        let node = resolve_node(&inner.root, &segments, path)?;
        let children = match node {
            Node::Dir(children) => children,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{} is not a directory", path),
                ));
            }
        };

        let mut entries = Vec::with_capacity(children.len());
        for (name, child) in children {
            // A broken link still shows up in the listing; report it as an
            // empty file rather than failing the whole directory.
            let stat = Self::stat_of(&inner.root, child, name).unwrap_or_else(|_| Stat::file(0));
            entries.push(DirEntry {
                name: name.clone(),
                stat,
            });
        }
        Ok(entries)
    }

    async fn read_stream(
        &self,
        path: &str,
        start: u64,
        end: Option<u64>,
    ) -> io::Result<DriveStream> {
        let segments = normalize_path(path);
        let inner = self.inner.read().expect("drive lock poisoned");
        let node = resolve_node(&inner.root, &segments, path)?;
        let bytes = match node {
            Node::File(bytes) => bytes.clone(),
            Node::Link(target) => {
                let target_segments = normalize_path(target);
                match resolve_node(&inner.root, &target_segments, path)? {
                    Node::File(bytes) => bytes.clone(),
                    _ => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            format!("{} is not a file", path),
                        ));
                    }
                }
            }
            Node::Dir(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is a directory", path),
                ));
            }
        };

        let len = bytes.len() as u64;
        if start > len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("read start {} beyond end of {}", start, path),
            ));
        }
        let stop = end.map_or(len, |e| (e + 1).min(len)).max(start);
        let window = bytes.slice(start as usize..stop as usize);
        Ok(Box::new(Cursor::new(window)))
    }
}

/// A keyed collection of in-memory drives, usable as the gateway's
/// injected drive resolver.
///
/// With `writable` set, resolving an unknown key creates a fresh empty
/// drive for it (mirroring SDK-style `Drive(key)` semantics); otherwise
/// unknown keys resolve to `None`.
pub struct MemoryStore {
    writable: bool,
    drives: RwLock<HashMap<String, Arc<MemoryDrive>>>,
}

impl MemoryStore {
    pub fn new(writable: bool) -> Self {
        MemoryStore {
            writable,
            drives: RwLock::new(HashMap::new()),
        }
    }

    /// Gets or creates the drive for `key`. Programmatic API for embedders
    /// and tests; HTTP traffic never creates drives through this.
    pub fn drive(&self, key: &str) -> Arc<MemoryDrive> {
        let mut drives = self.drives.write().expect("store lock poisoned");
        drives
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(MemoryDrive::new(key)))
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<MemoryDrive>> {
        self.drives
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    /// Seeds one drive per immediate subdirectory of `root`; the
    /// subdirectory name becomes the drive key. Files are loaded in a
    /// sorted walk so seeded revisions are deterministic.
    pub async fn seed_from_dir(&self, root: &Path) -> io::Result<usize> {
        let mut seeded = 0usize;
        for dir in sorted_entries(root).await? {
            if !dir.metadata.is_dir() {
                continue;
            }
            let key = match dir.name.to_str() {
                Some(name) => name.to_string(),
                None => continue,
            };
            let drive = self.drive(&key);
            let mut file_count = 0usize;
            seed_tree(&drive, &dir.path, String::new(), &mut file_count).await?;
            info!(key = %key, files = file_count, version = drive.version(), "drive seeded");
            seeded += 1;
        }
        Ok(seeded)
    }
}

struct WalkEntry {
    name: std::ffi::OsString,
    path: std::path::PathBuf,
    metadata: std::fs::Metadata,
}

async fn sorted_entries(dir: &Path) -> io::Result<Vec<WalkEntry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(WalkEntry {
            name: entry.file_name(),
            metadata: entry.metadata().await?,
            path: entry.path(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

// Iterative-with-queue rather than recursive: async fns cannot recurse
// without boxing. Breadth-first over sorted entries keeps seeded write
// order deterministic.
async fn seed_tree(
    drive: &MemoryDrive,
    dir: &Path,
    prefix: String,
    file_count: &mut usize,
) -> io::Result<()> {
    let mut queue: std::collections::VecDeque<(std::path::PathBuf, String)> =
        std::collections::VecDeque::from([(dir.to_path_buf(), prefix)]);
    while let Some((current_dir, current_prefix)) = queue.pop_front() {
        for entry in sorted_entries(&current_dir).await? {
            let name = match entry.name.to_str() {
                Some(name) => name.to_string(),
                None => continue,
            };
            let drive_path = if current_prefix.is_empty() {
                name
            } else {
                format!("{}/{}", current_prefix, name)
            };
            if entry.metadata.is_dir() {
                queue.push_back((entry.path, drive_path));
            } else {
                let contents = tokio::fs::read(&entry.path).await?;
                drive.write_file(&drive_path, contents)?;
                *file_count += 1;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl DriveResolver for MemoryStore {
    async fn resolve_drive(&self, key: &str) -> io::Result<Option<Arc<dyn Drive>>> {
        if let Some(drive) = self.get(key) {
            return Ok(Some(drive));
        }
        if self.writable {
            debug!(key, "creating drive for unknown key (writable store)");
            return Ok(Some(self.drive(key)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_drive_starts_at_revision_one() {
        let drive = MemoryDrive::new("example");
        assert_eq!(drive.version(), 1);
        drive.write_file("example.txt", "Example").unwrap();
        assert_eq!(drive.version(), 2);
    }

    #[tokio::test]
    async fn stat_distinguishes_files_and_directories() {
        let drive = MemoryDrive::new("example");
        drive.write_file("docs/readme.md", "hello").unwrap();

        let file = drive.stat("docs/readme.md").await.unwrap();
        assert!(!file.is_directory());
        assert_eq!(file.size, 5);

        let dir = drive.stat("docs").await.unwrap();
        assert!(dir.is_directory());

        let missing = drive.stat("docs/nope.md").await.unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn read_dir_preserves_write_order() {
        let drive = MemoryDrive::new("example");
        drive.write_file("example/b.txt", "b").unwrap();
        drive.write_file("example/a.txt", "a").unwrap();

        let entries = drive.read_dir("example").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
    }

    #[tokio::test]
    async fn rewriting_a_file_keeps_its_listing_position() {
        let drive = MemoryDrive::new("example");
        drive.write_file("d/b.txt", "b").unwrap();
        drive.write_file("d/a.txt", "a").unwrap();
        drive.write_file("d/b.txt", "b2").unwrap();

        let entries = drive.read_dir("d").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
        assert_eq!(entries[0].stat.size, 2);
    }

    #[tokio::test]
    async fn links_are_followed_for_stat_and_read() {
        let drive = MemoryDrive::new("example");
        drive.write_file("real/data.txt", "payload").unwrap();
        drive.symlink("alias", "/real").unwrap();

        let stat = drive.stat("alias/data.txt").await.unwrap();
        assert_eq!(stat.size, 7);

        let mut stream = drive.read_stream("alias/data.txt", 0, None).await.unwrap();
        let mut buffer = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut buffer)
            .await
            .unwrap();
        assert_eq!(buffer, b"payload");
    }

    #[tokio::test]
    async fn link_cycles_error_instead_of_hanging() {
        let drive = MemoryDrive::new("example");
        drive.symlink("a", "/b").unwrap();
        drive.symlink("b", "/a").unwrap();

        let err = drive.stat("a").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::FilesystemLoop);
    }

    #[tokio::test]
    async fn read_stream_honors_byte_windows() {
        let drive = MemoryDrive::new("example");
        drive.write_file("f.bin", &b"0123456789"[..]).unwrap();

        let mut stream = drive.read_stream("f.bin", 2, Some(5)).await.unwrap();
        let mut buffer = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut buffer)
            .await
            .unwrap();
        assert_eq!(buffer, b"2345");
    }

    #[tokio::test]
    async fn store_resolves_only_known_keys_unless_writable() {
        let store = MemoryStore::new(false);
        store.drive("known").write_file("x", "x").unwrap();

        assert!(store.resolve_drive("known").await.unwrap().is_some());
        assert!(store.resolve_drive("unknown").await.unwrap().is_none());

        let writable = MemoryStore::new(true);
        let created = writable.resolve_drive("fresh").await.unwrap().unwrap();
        assert_eq!(created.version(), 1);
    }
}
