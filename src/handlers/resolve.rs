use std::io;

use tracing::debug;

use crate::drive::{DirEntry, Drive, normalize_path};

/// Path that answers drive identity discovery without touching the tree.
pub const WELL_KNOWN_DAT: &str = ".well-known/dat";

/// Outcome of resolving a URL-style path inside a drive.
#[derive(Debug)]
pub enum ResolvedEntry {
    File {
        path: String,
        size: u64,
    },
    Directory {
        path: String,
        entries: Vec<DirEntry>,
    },
    /// The `.well-known/dat` identity descriptor; out-of-band, not tree
    /// content.
    Discovery,
    Unresolved {
        reason: String,
    },
}

/// Resolves `raw_path` against the drive: file, directory listing, the
/// discovery descriptor, or unresolved.
///
/// A directory that carries an `index.html` file resolves to that file
/// instead of a listing. In-drive link redirects are the drive's own
/// contract and have already been followed by the time stat returns.
/// Storage errors (including not-found) come back as `Unresolved` data;
/// this function never fails past its boundary.
pub async fn resolve(drive: &dyn Drive, raw_path: &str) -> ResolvedEntry {
    let path = normalize_path(raw_path).join("/");

    if path == WELL_KNOWN_DAT {
        return ResolvedEntry::Discovery;
    }

    let stat = match drive.stat(&path).await {
        Ok(stat) => stat,
        Err(err) => return unresolved(&path, err),
    };

    if !stat.is_directory() {
        return ResolvedEntry::File {
            path,
            size: stat.size,
        };
    }

    // Implicit index convention: serve <dir>/index.html when present.
    let index_path = if path.is_empty() {
        "index.html".to_string()
    } else {
        format!("{}/index.html", path)
    };
    if let Ok(index_stat) = drive.stat(&index_path).await {
        if !index_stat.is_directory() {
            debug!(path = %index_path, "directory resolved through index file");
            return ResolvedEntry::File {
                path: index_path,
                size: index_stat.size,
            };
        }
    }

    match drive.read_dir(&path).await {
        Ok(entries) => ResolvedEntry::Directory { path, entries },
        Err(err) => unresolved(&path, err),
    }
}

fn unresolved(path: &str, err: io::Error) -> ResolvedEntry {
    let reason = if err.kind() == io::ErrorKind::NotFound {
        "Not Found".to_string()
    } else {
        err.to_string()
    };
    debug!(path, %reason, "path did not resolve");
    ResolvedEntry::Unresolved { reason }
}
