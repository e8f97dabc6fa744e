// CLASSIFICATION: COMMUNITY
// Filename: tree.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-02-14

//! The naming server's directory tree.
//!
//! Interior nodes are directories holding name-keyed children; leaves are
//! files bound to the storage server that owns their bytes. The root is
//! always a directory and is never removed. The tree is plain data; the
//! owning node provides the locking.

use std::collections::BTreeMap;

use crate::path::Path;
use crate::storage::{CommandStub, StorageStub};

enum Node {
    Directory(BTreeMap<String, Node>),
    File {
        storage: StorageStub,
        command: CommandStub,
    },
}

/// Rooted tree mapping logical paths to directories and placed files.
pub(crate) struct DirectoryTree {
    root: Node,
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self {
            root: Node::Directory(BTreeMap::new()),
        }
    }

    fn find(&self, path: &Path) -> Option<&Node> {
        let mut node = &self.root;
        for component in path.components() {
            match node {
                Node::Directory(children) => node = children.get(component)?,
                Node::File { .. } => return None,
            }
        }
        Some(node)
    }

    /// Children of the directory at `path`, for mutation. `None` when the
    /// path is missing or names a file.
    fn directory_mut(&mut self, path: &Path) -> Option<&mut BTreeMap<String, Node>> {
        let mut node = &mut self.root;
        for component in path.components() {
            match node {
                Node::Directory(children) => node = children.get_mut(component)?,
                Node::File { .. } => return None,
            }
        }
        match node {
            Node::Directory(children) => Some(children),
            Node::File { .. } => None,
        }
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    /// `None` when the path is unknown.
    pub fn is_directory(&self, path: &Path) -> Option<bool> {
        Some(matches!(self.find(path)?, Node::Directory(_)))
    }

    /// Immediate child names, already sorted. `None` for a missing path
    /// or a file.
    pub fn list(&self, path: &Path) -> Option<Vec<String>> {
        match self.find(path)? {
            Node::Directory(children) => Some(children.keys().cloned().collect()),
            Node::File { .. } => None,
        }
    }

    /// Add a file under an existing parent directory. `false` when the
    /// name is already taken; the caller checks the parent beforehand.
    pub fn insert_file(&mut self, path: &Path, storage: &StorageStub, command: &CommandStub) -> bool {
        self.insert(path, || Node::File {
            storage: storage.clone(),
            command: command.clone(),
        })
    }

    /// Add an empty directory under an existing parent directory.
    pub fn insert_directory(&mut self, path: &Path) -> bool {
        self.insert(path, || Node::Directory(BTreeMap::new()))
    }

    fn insert(&mut self, path: &Path, build: impl FnOnce() -> Node) -> bool {
        let name = match path.last() {
            Ok(name) => name.to_string(),
            Err(_) => return false,
        };
        let parent = match path.parent() {
            Ok(parent) => parent,
            Err(_) => return false,
        };
        match self.directory_mut(&parent) {
            Some(children) => {
                if children.contains_key(&name) {
                    return false;
                }
                children.insert(name, build());
                true
            }
            None => false,
        }
    }

    /// Whether some strict ancestor of `path` resolves to a file node,
    /// which would make the path impossible to ingest.
    pub fn shadowed_by_file(&self, path: &Path) -> bool {
        let mut node = &self.root;
        for component in path.components() {
            match node {
                Node::Directory(children) => match children.get(component) {
                    Some(next) => node = next,
                    None => return false,
                },
                Node::File { .. } => return true,
            }
        }
        false
    }

    /// Add a file, creating intermediate directories on demand; the
    /// registration path. `false` when the entry already exists or a file
    /// shadows an ancestor.
    pub fn ingest_file(
        &mut self,
        path: &Path,
        storage: &StorageStub,
        command: &CommandStub,
    ) -> bool {
        if path.is_root() || self.shadowed_by_file(path) {
            return false;
        }
        let components: Vec<&str> = path.components().collect();
        let mut node = &mut self.root;
        for (index, component) in components.iter().enumerate() {
            let children = match node {
                Node::Directory(children) => children,
                Node::File { .. } => return false,
            };
            if index == components.len() - 1 {
                if children.contains_key(*component) {
                    return false;
                }
                children.insert(
                    (*component).to_string(),
                    Node::File {
                        storage: storage.clone(),
                        command: command.clone(),
                    },
                );
                return true;
            }
            node = children
                .entry((*component).to_string())
                .or_insert_with(|| Node::Directory(BTreeMap::new()));
        }
        false
    }

    /// Detach the subtree at `path`. `false` for root or a missing path.
    pub fn remove(&mut self, path: &Path) -> bool {
        let name = match path.last() {
            Ok(name) => name.to_string(),
            Err(_) => return false,
        };
        let parent = match path.parent() {
            Ok(parent) => parent,
            Err(_) => return false,
        };
        match self.directory_mut(&parent) {
            Some(children) => children.remove(&name).is_some(),
            None => false,
        }
    }

    /// The storage binding of the file at `path`; `None` for missing
    /// paths and directories.
    pub fn binding(&self, path: &Path) -> Option<(&StorageStub, &CommandStub)> {
        match self.find(path)? {
            Node::File { storage, command } => Some((storage, command)),
            Node::Directory(_) => None,
        }
    }

    /// Distinct command stubs of every file at or below `path`, in first
    /// encounter order. `None` when the path is unknown.
    pub fn commands_under(&self, path: &Path) -> Option<Vec<CommandStub>> {
        let node = self.find(path)?;
        let mut stubs = Vec::new();
        collect_commands(node, &mut stubs);
        Some(stubs)
    }
}

fn collect_commands(node: &Node, out: &mut Vec<CommandStub>) {
    match node {
        Node::File { command, .. } => {
            if !out.contains(command) {
                out.push(command.clone());
            }
        }
        Node::Directory(children) => {
            for child in children.values() {
                collect_commands(child, out);
            }
        }
    }
}
