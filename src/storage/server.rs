// CLASSIFICATION: COMMUNITY
// Filename: server.rs v0.6
// Author: Lukas Bower
// Date Modified: 2026-02-14

//! Storage server: file bytes under a local root directory.
//!
//! [`StorageNode`] carries the operations; [`StorageServer`] carries the
//! two skeletons and the registration bootstrap. Every operation holds
//! the node's single I/O mutex, so reads, writes, creates and deletes on
//! one server are totally ordered.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use hivefs_wire::{Iface, RemoteError, RequestBody, ResponseBody};

use crate::naming::Registration;
use crate::path::Path;
use crate::rmi::transport::RemoteHandler;
use crate::rmi::{Connector, Skeleton};
use crate::storage::{Command, CommandStub, Storage, StorageStub};

/// File and control operations against one local root.
pub struct StorageNode {
    root: PathBuf,
    io_lock: Mutex<()>,
}

impl StorageNode {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            io_lock: Mutex::new(()),
        }
    }

    /// The local directory this node serves.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        path.relative_to(&self.root)
    }

    /// Byte length of an existing regular file; `NotFound` otherwise.
    fn file_len(local: &std::path::Path) -> Result<i64, RemoteError> {
        match fs::metadata(local) {
            Ok(meta) if meta.is_file() => Ok(meta.len() as i64),
            _ => Err(RemoteError::not_found(format!(
                "no file at {}",
                local.display()
            ))),
        }
    }
}

impl Storage for StorageNode {
    fn size(&self, path: &Path) -> Result<i64, RemoteError> {
        let _io = self.io_lock.lock().expect("storage lock poisoned");
        Self::file_len(&self.resolve(path))
    }

    fn read(&self, path: &Path, offset: i64, length: i32) -> Result<Vec<u8>, RemoteError> {
        let _io = self.io_lock.lock().expect("storage lock poisoned");
        let local = self.resolve(path);
        let len = Self::file_len(&local)?;
        let end = offset.checked_add(i64::from(length));
        let in_range = offset >= 0 && length >= 0 && end.map_or(false, |end| end <= len);
        if !in_range {
            return Err(RemoteError::out_of_bounds(format!(
                "range {offset}+{length} outside file of {len} bytes"
            )));
        }
        let mut file = File::open(&local)
            .map_err(|err| RemoteError::io(format!("open {}: {err}", local.display())))?;
        file.seek(SeekFrom::Start(offset as u64))
            .map_err(|err| RemoteError::io(format!("seek {}: {err}", local.display())))?;
        let mut data = vec![0u8; length as usize];
        file.read_exact(&mut data)
            .map_err(|err| RemoteError::io(format!("read {}: {err}", local.display())))?;
        Ok(data)
    }

    fn write(&self, path: &Path, offset: i64, data: &[u8]) -> Result<(), RemoteError> {
        let _io = self.io_lock.lock().expect("storage lock poisoned");
        let local = self.resolve(path);
        Self::file_len(&local)?;
        if offset < 0 {
            return Err(RemoteError::out_of_bounds(format!(
                "negative write offset {offset}"
            )));
        }
        let mut file = OpenOptions::new()
            .write(true)
            .open(&local)
            .map_err(|err| RemoteError::io(format!("open {}: {err}", local.display())))?;
        file.seek(SeekFrom::Start(offset as u64))
            .map_err(|err| RemoteError::io(format!("seek {}: {err}", local.display())))?;
        file.write_all(data)
            .map_err(|err| RemoteError::io(format!("write {}: {err}", local.display())))?;
        Ok(())
    }
}

impl Command for StorageNode {
    fn create(&self, path: &Path) -> Result<bool, RemoteError> {
        let _io = self.io_lock.lock().expect("storage lock poisoned");
        if path.is_root() {
            return Ok(false);
        }
        let local = self.resolve(path);
        if local.exists() {
            return Ok(false);
        }
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| RemoteError::io(format!("mkdir {}: {err}", parent.display())))?;
        }
        File::create(&local)
            .map_err(|err| RemoteError::io(format!("create {}: {err}", local.display())))?;
        Ok(true)
    }

    fn delete(&self, path: &Path) -> Result<bool, RemoteError> {
        let _io = self.io_lock.lock().expect("storage lock poisoned");
        if path.is_root() {
            return Ok(false);
        }
        let local = self.resolve(path);
        let meta = match fs::symlink_metadata(&local) {
            Ok(meta) => meta,
            Err(_) => return Ok(false),
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&local)
        } else {
            fs::remove_file(&local)
        };
        removed.map_err(|err| RemoteError::io(format!("delete {}: {err}", local.display())))?;
        Ok(true)
    }
}

struct StorageHandler(Arc<StorageNode>);

impl RemoteHandler for StorageHandler {
    fn iface(&self) -> Iface {
        Iface::Storage
    }

    fn handle(&self, body: RequestBody) -> Result<ResponseBody, RemoteError> {
        match body {
            RequestBody::Size { path } => Ok(ResponseBody::Size {
                size: self.0.size(&parse(&path)?)?,
            }),
            RequestBody::Read {
                path,
                offset,
                length,
            } => Ok(ResponseBody::Read {
                data: self.0.read(&parse(&path)?, offset, length)?,
            }),
            RequestBody::Write { path, offset, data } => {
                self.0.write(&parse(&path)?, offset, &data)?;
                Ok(ResponseBody::Write)
            }
            other => Err(RemoteError::remote_invocation(format!(
                "{} operation is not part of the storage interface",
                other.iface()
            ))),
        }
    }
}

struct CommandHandler(Arc<StorageNode>);

impl RemoteHandler for CommandHandler {
    fn iface(&self) -> Iface {
        Iface::Command
    }

    fn handle(&self, body: RequestBody) -> Result<ResponseBody, RemoteError> {
        match body {
            RequestBody::Create { path } => Ok(ResponseBody::Create {
                created: self.0.create(&parse(&path)?)?,
            }),
            RequestBody::Remove { path } => Ok(ResponseBody::Remove {
                deleted: self.0.delete(&parse(&path)?)?,
            }),
            other => Err(RemoteError::remote_invocation(format!(
                "{} operation is not part of the command interface",
                other.iface()
            ))),
        }
    }
}

fn parse(raw: &str) -> Result<Path, RemoteError> {
    raw.parse::<Path>().map_err(RemoteError::from)
}

/// A storage server: one local root behind a storage and a command
/// skeleton.
pub struct StorageServer {
    node: Arc<StorageNode>,
    storage_skeleton: Skeleton,
    command_skeleton: Skeleton,
}

impl StorageServer {
    /// Create a server for `root`. Nothing is bound until `start`.
    pub fn new(root: impl Into<PathBuf>, connector: Arc<Connector>) -> Self {
        let node = Arc::new(StorageNode::new(root.into()));
        let storage_skeleton = Skeleton::new(
            Arc::new(StorageHandler(Arc::clone(&node))),
            Arc::clone(&connector),
        );
        let command_skeleton =
            Skeleton::new(Arc::new(CommandHandler(Arc::clone(&node))), connector);
        Self {
            node,
            storage_skeleton,
            command_skeleton,
        }
    }

    /// Direct access to the node, for callers co-located with the server.
    #[must_use]
    pub fn node(&self) -> &StorageNode {
        &self.node
    }

    /// Stubs for the two interfaces; available once skeletons have
    /// addresses.
    pub fn stubs(&self) -> Result<(StorageStub, CommandStub), RemoteError> {
        Ok((
            StorageStub::for_skeleton(&self.storage_skeleton)?,
            CommandStub::for_skeleton(&self.command_skeleton)?,
        ))
    }

    /// Start both skeletons under `hostname` and register with the naming
    /// server, then honour the eviction list and prune emptied
    /// directories.
    pub fn start(&self, hostname: &str, naming: &dyn Registration) -> Result<(), RemoteError> {
        let files = Path::enumerate(self.node.root())?;
        self.storage_skeleton.set_address(hostname, None)?;
        self.command_skeleton.set_address(hostname, None)?;
        self.storage_skeleton.start()?;
        if let Err(err) = self.command_skeleton.start() {
            self.storage_skeleton.stop();
            return Err(err);
        }
        let (storage_stub, command_stub) = self.stubs()?;
        info!(
            "storage: serving {} on {} / {}",
            self.node.root().display(),
            storage_stub.addr(),
            command_stub.addr()
        );

        let evict = naming.register(storage_stub, command_stub, files)?;
        for path in &evict {
            match self.node.delete(path) {
                Ok(true) => {}
                Ok(false) => warn!("storage: eviction of {path} found nothing to delete"),
                Err(err) => return Err(err),
            }
        }
        prune_empty_dirs(self.node.root()).map_err(|err| {
            RemoteError::io(format!("pruning under {}: {err}", self.node.root().display()))
        })?;
        info!("storage: registered, {} paths evicted", evict.len());
        Ok(())
    }

    /// Stop both skeletons. Connections being served drain on their own.
    pub fn stop(&self) {
        self.storage_skeleton.stop();
        self.command_skeleton.stop();
        info!("storage: stopped serving {}", self.node.root().display());
    }
}

/// Remove every directory below `root` that contains nothing; `root`
/// itself always stays.
fn prune_empty_dirs(root: &std::path::Path) -> std::io::Result<()> {
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            prune_empty_dirs(&path)?;
            if fs::read_dir(&path)?.next().is_none() {
                fs::remove_dir(&path)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> Path {
        raw.parse().expect("valid path")
    }

    fn scratch_node() -> (tempfile::TempDir, StorageNode) {
        let dir = tempfile::tempdir().expect("tempdir");
        let node = StorageNode::new(dir.path().to_path_buf());
        (dir, node)
    }

    #[test]
    fn create_then_read_back() {
        let (_dir, node) = scratch_node();
        assert!(node.create(&path("/a/b/data")).unwrap());
        assert!(!node.create(&path("/a/b/data")).unwrap());
        assert_eq!(node.size(&path("/a/b/data")).unwrap(), 0);
        assert_eq!(node.read(&path("/a/b/data"), 0, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn write_extends_and_read_honours_file_offset() {
        let (_dir, node) = scratch_node();
        assert!(node.create(&path("/data")).unwrap());
        node.write(&path("/data"), 0, b"0123456789").unwrap();
        assert_eq!(node.read(&path("/data"), 5, 5).unwrap(), b"56789");
        node.write(&path("/data"), 3, &[1, 2, 3]).unwrap();
        assert_eq!(node.read(&path("/data"), 3, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn out_of_range_reads_are_refused() {
        let (_dir, node) = scratch_node();
        assert!(node.create(&path("/data")).unwrap());
        node.write(&path("/data"), 0, b"0123456789").unwrap();
        for (offset, length) in [(5i64, 6i32), (-1, 2), (0, -1), (i64::MAX, 1)] {
            let err = node.read(&path("/data"), offset, length).unwrap_err();
            assert_eq!(err.kind, hivefs_wire::ErrorKind::OutOfBounds);
        }
    }

    #[test]
    fn directories_are_not_files() {
        let (_dir, node) = scratch_node();
        assert!(node.create(&path("/d/inner")).unwrap());
        let err = node.size(&path("/d")).unwrap_err();
        assert_eq!(err.kind, hivefs_wire::ErrorKind::NotFound);
        let err = node.write(&path("/d"), 0, b"x").unwrap_err();
        assert_eq!(err.kind, hivefs_wire::ErrorKind::NotFound);
    }

    #[test]
    fn delete_handles_root_files_and_trees() {
        let (_dir, node) = scratch_node();
        assert!(!node.delete(&Path::root()).unwrap());
        assert!(!node.delete(&path("/ghost")).unwrap());
        assert!(node.create(&path("/d/one")).unwrap());
        assert!(node.create(&path("/d/two")).unwrap());
        assert!(node.delete(&path("/d")).unwrap());
        assert!(node.size(&path("/d/one")).is_err());
    }

    #[test]
    fn prune_keeps_the_root_itself() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::create_dir_all(dir.path().join("kept")).unwrap();
        fs::write(dir.path().join("kept/file"), b"x").unwrap();
        prune_empty_dirs(dir.path()).unwrap();
        assert!(!dir.path().join("a").exists());
        assert!(dir.path().join("kept/file").exists());
        assert!(dir.path().exists());
    }
}
