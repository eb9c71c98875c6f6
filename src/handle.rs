//! Working-directory handles and path resolution.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::block::{BlockKind, HeaderRecord, RootRecord, classify};
use crate::dir::{DirEntry, DirIter, lookup};
use crate::disk::Partition;
use crate::error::{AffsError, Result};
use crate::file::FileHandle;
use crate::source::BlockSource;
use crate::symlink::read_symlink_target;
use crate::utf8::encode_name;

/// Decoded record of the directory a handle points at.
#[derive(Debug, Clone)]
pub enum DirRecord {
    /// The volume root.
    Root(RootRecord),
    /// A user directory.
    UserDir(HeaderRecord),
}

impl DirRecord {
    /// Block address.
    pub const fn address(&self) -> u32 {
        match self {
            Self::Root(r) => r.address,
            Self::UserDir(h) => h.address,
        }
    }

    /// Hash table snapshot.
    pub fn hash_table(&self) -> &[u32] {
        match self {
            Self::Root(r) => &r.hash_table,
            Self::UserDir(h) => &h.table,
        }
    }

    /// Directory name (the volume name for the root).
    pub fn name(&self) -> &[u8] {
        match self {
            Self::Root(r) => &r.disk_name,
            Self::UserDir(h) => &h.name,
        }
    }

    /// Parent directory block, or `None` for the root.
    pub const fn parent(&self) -> Option<u32> {
        match self {
            Self::Root(_) => None,
            Self::UserDir(h) => Some(h.parent),
        }
    }
}

/// Load the directory at `address`, following a hard link to a directory.
fn load_dir<S: BlockSource>(partition: &Partition<'_, S>, address: u32) -> Result<DirRecord> {
    let mut block = partition.read_block(address)?;
    if classify(&block)? == BlockKind::HardLinkDir {
        let link = HeaderRecord::decode(&block)?;
        block = partition.read_block(link.real_entry)?;
    }

    match classify(&block)? {
        BlockKind::Root => Ok(DirRecord::Root(RootRecord::decode(&block)?)),
        BlockKind::UserDir => Ok(DirRecord::UserDir(HeaderRecord::decode(&block)?)),
        _ => Err(AffsError::NotADirectory(format!("block {}", block.address()))),
    }
}

/// A position in the directory tree.
///
/// The handle carries the directory's record and a snapshot of its hash
/// table taken when it was entered. Navigation returns new handles and
/// never modifies the one it was called on; [`change_dir`](Self::change_dir)
/// is the in-place variant and leaves the handle unchanged on failure.
pub struct DirectoryHandle<'a, S: BlockSource> {
    partition: Partition<'a, S>,
    record: DirRecord,
    path: Vec<String>,
}

impl<S: BlockSource> Clone for DirectoryHandle<'_, S> {
    fn clone(&self) -> Self {
        Self {
            partition: self.partition,
            record: self.record.clone(),
            path: self.path.clone(),
        }
    }
}

impl<S: BlockSource> std::fmt::Debug for DirectoryHandle<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryHandle")
            .field("partition", &self.partition.index())
            .field("address", &self.address())
            .field("path", &self.path())
            .finish()
    }
}

impl<'a, S: BlockSource> DirectoryHandle<'a, S> {
    pub(crate) fn at_root(partition: Partition<'a, S>, root: RootRecord) -> Self {
        Self {
            partition,
            record: DirRecord::Root(root),
            path: Vec::new(),
        }
    }

    /// Partition the handle belongs to.
    #[inline]
    pub const fn partition(&self) -> Partition<'a, S> {
        self.partition
    }

    /// Directory record captured on entry.
    #[inline]
    pub const fn record(&self) -> &DirRecord {
        &self.record
    }

    /// Block address of the directory.
    #[inline]
    pub const fn address(&self) -> u32 {
        self.record.address()
    }

    /// Whether the handle is at the volume root.
    #[inline]
    pub const fn is_root(&self) -> bool {
        matches!(self.record, DirRecord::Root(_))
    }

    /// Logical path from the root, `/` separated.
    pub fn path(&self) -> String {
        format!("/{}", self.path.join("/"))
    }

    /// Entries of the directory in bucket and chain order.
    pub fn list(&self) -> DirIter<'a, S> {
        DirIter::new(self.partition, self.record.hash_table().to_vec())
    }

    /// Find an entry of this directory by name (case-insensitive).
    pub fn lookup(&self, name: &str) -> Result<DirEntry> {
        let encoded = encode_name(name);
        let found = lookup(&self.partition, self.record.hash_table(), &encoded);
        match found {
            Err(AffsError::NotFound(_)) if *encoded != *name.as_bytes() => {
                lookup(&self.partition, self.record.hash_table(), name.as_bytes())
            }
            other => other,
        }
    }

    /// Handle for the parent directory; the root is its own parent.
    pub fn parent(&self) -> Result<Self> {
        let Some(parent) = self.record.parent() else {
            return Ok(self.clone());
        };
        let record = load_dir(&self.partition, parent)?;
        let mut path = self.path.clone();
        path.pop();
        Ok(Self {
            partition: self.partition,
            record,
            path,
        })
    }

    /// Handle for the volume root, freshly read.
    pub fn root(&self) -> Result<Self> {
        self.partition.root()
    }

    fn enter(&self, name: &str) -> Result<Self> {
        let entry = self.lookup(name)?;
        if !entry.is_dir() {
            return Err(AffsError::NotADirectory(name.to_owned()));
        }
        let record = load_dir(&self.partition, entry.target())?;
        debug!(target: "affs::dir", event = "enter", name, address = record.address());

        let mut path = self.path.clone();
        path.push(entry.name_str().into_owned());
        Ok(Self {
            partition: self.partition,
            record,
            path,
        })
    }

    /// Resolve `path` relative to this directory.
    ///
    /// `/` (or a leading `/`) anchors at the root, `..` moves to the parent
    /// and `.` or empty components are skipped. Every component must name a
    /// directory, else the whole call fails with [`AffsError::NotFound`] or
    /// [`AffsError::NotADirectory`].
    pub fn cd(&self, path: &str) -> Result<Self> {
        let mut dir = if path.starts_with('/') {
            self.root()?
        } else {
            self.clone()
        };

        for component in path.split('/') {
            dir = match component {
                "" | "." => continue,
                ".." => dir.parent()?,
                name => dir.enter(name)?,
            };
        }
        Ok(dir)
    }

    /// In-place [`cd`](Self::cd). The handle is left as it was on error.
    pub fn change_dir(&mut self, path: &str) -> Result<()> {
        *self = self.cd(path)?;
        Ok(())
    }

    fn resolve_leaf<'p>(&self, path: &'p str) -> Result<(Self, &'p str)> {
        match path.rsplit_once('/') {
            Some((dir, leaf)) if dir.is_empty() => Ok((self.root()?, leaf)),
            Some((dir, leaf)) => Ok((self.cd(dir)?, leaf)),
            None => Ok((self.clone(), path)),
        }
    }

    /// Find the entry a path names.
    pub fn stat(&self, path: &str) -> Result<DirEntry> {
        let (dir, leaf) = self.resolve_leaf(path)?;
        dir.lookup(leaf)
    }

    /// Open a file by path relative to this directory.
    pub fn open_file(&self, path: &str) -> Result<FileHandle<'a, S>> {
        let entry = self.stat(path)?;
        if !entry.is_file() {
            return Err(AffsError::NotAFile(path.to_owned()));
        }
        FileHandle::open(self.partition, entry.address)
    }

    /// Target path of a soft link.
    pub fn read_link(&self, path: &str) -> Result<String> {
        let entry = self.stat(path)?;
        if !entry.is_symlink() {
            return Err(AffsError::NotASymlink(path.to_owned()));
        }
        read_symlink_target(&self.partition.read_block(entry.address)?)
    }

    /// Depth-first walk of everything below this directory.
    pub fn walk(&self) -> Walk<'a, S> {
        let prefix = if self.path.is_empty() {
            String::new()
        } else {
            self.path()
        };
        Walk {
            partition: self.partition,
            stack: vec![(prefix, self.list())],
            visited: HashSet::from([self.address()]),
        }
    }
}

/// Recursive directory walk yielding `(path, entry)` pairs.
///
/// Each directory's entries come in listing order, and a subdirectory's
/// contents follow right after the subdirectory itself. Directories already
/// visited (through hard links or corrupt parent pointers) are not entered
/// again.
pub struct Walk<'a, S: BlockSource> {
    partition: Partition<'a, S>,
    stack: Vec<(String, DirIter<'a, S>)>,
    visited: HashSet<u32>,
}

impl<S: BlockSource> Iterator for Walk<'_, S> {
    type Item = Result<(String, DirEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, entries) = self.stack.last_mut()?;
            let entry = match entries.next() {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Err(err)) => return Some(Err(err)),
                Some(Ok(entry)) => entry,
            };
            let path = format!("{prefix}/{}", entry.name_str());

            if entry.is_dir() && self.visited.insert(entry.target()) {
                match load_dir(&self.partition, entry.target()) {
                    Ok(record) => {
                        let table = record.hash_table().to_vec();
                        self.stack
                            .push((path.clone(), DirIter::new(self.partition, table)));
                    }
                    Err(err) => {
                        warn!(target: "affs::dir", event = "walk_skip_dir", path = %path, error = %err);
                    }
                }
            }
            return Some(Ok((path, entry)));
        }
    }
}
