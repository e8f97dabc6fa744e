// CLASSIFICATION: COMMUNITY
// Filename: server.rs v0.7
// Author: Lukas Bower
// Date Modified: 2026-02-14

//! Naming server: the directory tree and file placement authority.
//!
//! One [`NamingNode`] holds the tree, the registered storage pairs and
//! the placement cursor, and implements both remote interfaces; the
//! [`NamingServer`] wrapper binds the service and registration skeletons
//! to that same node on the well-known ports. All naming state sits
//! behind a single monitor, so every operation is atomic at whole-call
//! granularity, outbound storage calls included.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};

use hivefs_wire::{
    Iface, RemoteError, RequestBody, ResponseBody, REGISTRATION_PORT, SERVICE_PORT,
};

use crate::naming::tree::DirectoryTree;
use crate::naming::{Registration, Service};
use crate::path::Path;
use crate::rmi::transport::RemoteHandler;
use crate::rmi::{Connector, Skeleton};
use crate::storage::{Command, CommandStub, StorageStub};

/// Addresses the naming server listens on.
#[derive(Debug, Clone)]
pub struct NamingConfig {
    /// Host both skeletons bind to.
    pub host: IpAddr,
    /// Port of the client-facing service interface.
    pub service_port: u16,
    /// Port of the registration interface.
    pub registration_port: u16,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            service_port: SERVICE_PORT,
            registration_port: REGISTRATION_PORT,
        }
    }
}

struct State {
    tree: DirectoryTree,
    registered: Vec<(StorageStub, CommandStub)>,
}

/// Shared state and operation logic of the naming server.
pub struct NamingNode {
    state: Mutex<State>,
    cursor: AtomicUsize,
}

impl NamingNode {
    /// A node with an empty tree and no registered storage servers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tree: DirectoryTree::new(),
                registered: Vec::new(),
            }),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Round-robin pick of a registered storage pair.
    fn pick_pair(&self, state: &State) -> Result<(StorageStub, CommandStub), RemoteError> {
        if state.registered.is_empty() {
            return Err(RemoteError::illegal_state(
                "no storage server is registered",
            ));
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % state.registered.len();
        Ok(state.registered[index].clone())
    }
}

impl Default for NamingNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for NamingNode {
    fn is_directory(&self, path: &Path) -> Result<bool, RemoteError> {
        let state = self.state.lock().expect("naming state poisoned");
        state
            .tree
            .is_directory(path)
            .ok_or_else(|| RemoteError::not_found(format!("{path} is not in the tree")))
    }

    fn list(&self, directory: &Path) -> Result<Vec<String>, RemoteError> {
        let state = self.state.lock().expect("naming state poisoned");
        state
            .tree
            .list(directory)
            .ok_or_else(|| RemoteError::not_found(format!("{directory} is not a known directory")))
    }

    fn create_file(&self, path: &Path) -> Result<bool, RemoteError> {
        if path.is_root() {
            return Ok(false);
        }
        let parent = path.parent().map_err(RemoteError::from)?;
        let mut state = self.state.lock().expect("naming state poisoned");
        if state.tree.is_directory(&parent) != Some(true) {
            return Err(RemoteError::not_found(format!(
                "parent directory {parent} does not exist"
            )));
        }
        if state.tree.exists(path) {
            return Ok(false);
        }
        let (storage, command) = self.pick_pair(&state)?;
        if !command.create(path)? {
            // Placement found stale bytes at the path; the binding below
            // still makes this server authoritative for it.
            warn!("naming: {} already held bytes for {path}", command.addr());
        }
        state.tree.insert_file(path, &storage, &command);
        info!("naming: file {path} placed on {}", storage.addr());
        Ok(true)
    }

    fn create_directory(&self, path: &Path) -> Result<bool, RemoteError> {
        if path.is_root() {
            return Ok(false);
        }
        let parent = path.parent().map_err(RemoteError::from)?;
        let mut state = self.state.lock().expect("naming state poisoned");
        if state.tree.is_directory(&parent) != Some(true) {
            return Err(RemoteError::not_found(format!(
                "parent directory {parent} does not exist"
            )));
        }
        if state.tree.exists(path) {
            return Ok(false);
        }
        state.tree.insert_directory(path);
        Ok(true)
    }

    fn delete(&self, path: &Path) -> Result<bool, RemoteError> {
        if path.is_root() {
            return Ok(false);
        }
        let mut state = self.state.lock().expect("naming state poisoned");
        let commands = state
            .tree
            .commands_under(path)
            .ok_or_else(|| RemoteError::not_found(format!("{path} is not in the tree")))?;
        for command in &commands {
            match command.delete(path) {
                Ok(true) => {}
                Ok(false) => {
                    warn!("naming: {} had nothing to delete at {path}", command.addr());
                    return Ok(false);
                }
                Err(err) => {
                    warn!("naming: delete of {path} on {} failed: {err}", command.addr());
                    return Ok(false);
                }
            }
        }
        state.tree.remove(path);
        Ok(true)
    }

    fn get_storage(&self, path: &Path) -> Result<StorageStub, RemoteError> {
        let state = self.state.lock().expect("naming state poisoned");
        if !state.tree.exists(path) {
            return Err(RemoteError::not_found(format!("{path} is not in the tree")));
        }
        match state.tree.binding(path) {
            Some((storage, _)) => Ok(storage.clone()),
            None => Err(RemoteError::not_found(format!(
                "{path} is a directory and has no storage binding"
            ))),
        }
    }
}

impl Registration for NamingNode {
    fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, RemoteError> {
        let mut state = self.state.lock().expect("naming state poisoned");
        if state
            .registered
            .iter()
            .any(|(s, c)| *s == storage || *c == command)
        {
            return Err(RemoteError::illegal_state(
                "storage server is already registered",
            ));
        }

        let mut evict = Vec::new();
        let mut keep = Vec::new();
        for file in &files {
            if file.is_root() {
                continue;
            }
            if state.tree.exists(file) || state.tree.shadowed_by_file(file) {
                evict.push(file.clone());
            } else {
                keep.push(file);
            }
        }
        for file in keep {
            if !state.tree.ingest_file(file, &storage, &command) && !state.tree.exists(file) {
                // A file earlier in the same manifest shadows this path.
                evict.push(file.clone());
            }
        }

        info!(
            "naming: registered {} ({} files offered, {} evicted)",
            storage.addr(),
            files.len(),
            evict.len()
        );
        state.registered.push((storage, command));
        Ok(evict)
    }
}

struct ServiceHandler(Arc<NamingNode>);

impl RemoteHandler for ServiceHandler {
    fn iface(&self) -> Iface {
        Iface::Service
    }

    fn handle(&self, body: RequestBody) -> Result<ResponseBody, RemoteError> {
        match body {
            RequestBody::IsDirectory { path } => Ok(ResponseBody::IsDirectory {
                value: self.0.is_directory(&parse(&path)?)?,
            }),
            RequestBody::List { path } => Ok(ResponseBody::List {
                names: self.0.list(&parse(&path)?)?,
            }),
            RequestBody::CreateFile { path } => Ok(ResponseBody::CreateFile {
                created: self.0.create_file(&parse(&path)?)?,
            }),
            RequestBody::CreateDirectory { path } => Ok(ResponseBody::CreateDirectory {
                created: self.0.create_directory(&parse(&path)?)?,
            }),
            RequestBody::DeleteEntry { path } => Ok(ResponseBody::DeleteEntry {
                deleted: self.0.delete(&parse(&path)?)?,
            }),
            RequestBody::GetStorage { path } => Ok(ResponseBody::GetStorage {
                stub: self.0.get_storage(&parse(&path)?)?.to_ref(),
            }),
            other => Err(RemoteError::remote_invocation(format!(
                "{} operation is not part of the service interface",
                other.iface()
            ))),
        }
    }
}

struct RegistrationHandler {
    node: Arc<NamingNode>,
    connector: Arc<Connector>,
}

impl RemoteHandler for RegistrationHandler {
    fn iface(&self) -> Iface {
        Iface::Registration
    }

    fn handle(&self, body: RequestBody) -> Result<ResponseBody, RemoteError> {
        match body {
            RequestBody::Register {
                storage,
                command,
                files,
            } => {
                let storage = StorageStub::from_ref(&storage, Arc::clone(&self.connector))?;
                let command = CommandStub::from_ref(&command, Arc::clone(&self.connector))?;
                let files = files
                    .iter()
                    .map(|raw| parse(raw))
                    .collect::<Result<Vec<_>, _>>()?;
                let evict = self.node.register(storage, command, files)?;
                Ok(ResponseBody::Register {
                    evict: evict.iter().map(Path::to_string).collect(),
                })
            }
            other => Err(RemoteError::remote_invocation(format!(
                "{} operation is not part of the registration interface",
                other.iface()
            ))),
        }
    }
}

fn parse(raw: &str) -> Result<Path, RemoteError> {
    raw.parse::<Path>().map_err(RemoteError::from)
}

/// The naming server: one node behind two well-known skeletons.
pub struct NamingServer {
    node: Arc<NamingNode>,
    service_skeleton: Skeleton,
    registration_skeleton: Skeleton,
}

impl NamingServer {
    /// Create a naming server; nothing is bound until `start`.
    pub fn new(connector: Arc<Connector>, config: NamingConfig) -> Self {
        let node = Arc::new(NamingNode::new());
        let service_skeleton = Skeleton::with_address(
            Arc::new(ServiceHandler(Arc::clone(&node))),
            Arc::clone(&connector),
            SocketAddr::new(config.host, config.service_port),
        );
        let registration_skeleton = Skeleton::with_address(
            Arc::new(RegistrationHandler {
                node: Arc::clone(&node),
                connector: Arc::clone(&connector),
            }),
            connector,
            SocketAddr::new(config.host, config.registration_port),
        );
        Self {
            node,
            service_skeleton,
            registration_skeleton,
        }
    }

    /// Direct access to the node, for callers co-located with the server.
    #[must_use]
    pub fn node(&self) -> &Arc<NamingNode> {
        &self.node
    }

    /// Start both skeletons. On a partial failure the one that did start
    /// is stopped again.
    pub fn start(&self) -> Result<(), RemoteError> {
        self.service_skeleton.start()?;
        if let Err(err) = self.registration_skeleton.start() {
            self.service_skeleton.stop();
            return Err(err);
        }
        info!("naming: serving on {:?}", self.service_skeleton.address());
        Ok(())
    }

    /// Stop both skeletons; in-flight calls drain on their own threads.
    pub fn stop(&self) {
        self.service_skeleton.stop();
        self.registration_skeleton.stop();
        info!("naming: stopped");
    }

    /// Stub for the client-facing interface of this server.
    pub fn service_stub(&self) -> Result<super::ServiceStub, RemoteError> {
        super::ServiceStub::for_skeleton(&self.service_skeleton)
    }

    /// Stub for the registration interface of this server.
    pub fn registration_stub(&self) -> Result<super::RegistrationStub, RemoteError> {
        super::RegistrationStub::for_skeleton(&self.registration_skeleton)
    }
}
