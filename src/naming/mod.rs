// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-02-14

//! Naming-server interfaces and their forwarder stubs.
//!
//! [`Service`] is what filesystem clients call; [`Registration`] is the
//! one-shot interface storage servers use to announce themselves. Both
//! are served from well-known ports so bootstrap needs no discovery.

use std::net::SocketAddr;
use std::sync::Arc;

use hivefs_wire::{Iface, RemoteError, RequestBody, ResponseBody};

use crate::path::Path;
use crate::rmi::stub::{unexpected_reply, Target};
use crate::rmi::{Connector, Skeleton};
use crate::storage::{CommandStub, StorageStub};

pub mod server;
mod tree;

pub use server::{NamingConfig, NamingNode, NamingServer};

/// Client-facing operations of the naming server.
pub trait Service {
    /// Whether `path` names a directory node.
    fn is_directory(&self, path: &Path) -> Result<bool, RemoteError>;

    /// Names of the directory's immediate children.
    fn list(&self, directory: &Path) -> Result<Vec<String>, RemoteError>;

    /// Add a file node and place it on a registered storage server.
    /// `false` when the path already exists.
    fn create_file(&self, path: &Path) -> Result<bool, RemoteError>;

    /// Add a directory node. `false` when the path already exists.
    fn create_directory(&self, path: &Path) -> Result<bool, RemoteError>;

    /// Remove the file or subtree at `path`, deleting the bytes on every
    /// storage server involved. `false` when a storage server refuses.
    fn delete(&self, path: &Path) -> Result<bool, RemoteError>;

    /// The storage stub bound to the file at `path`.
    fn get_storage(&self, path: &Path) -> Result<StorageStub, RemoteError>;
}

/// Storage-server-facing operation of the naming server.
pub trait Registration {
    /// Announce a storage server together with the files already under
    /// its local root. Returns the paths it must evict because the
    /// naming server knows them already.
    fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, RemoteError>;
}

/// Forwarder implementing [`Service`] against a remote naming server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceStub {
    target: Target,
}

impl ServiceStub {
    /// Stub for a skeleton in this process; adopts address and connector.
    pub fn for_skeleton(skeleton: &Skeleton) -> Result<Self, RemoteError> {
        Ok(Self {
            target: Target::for_skeleton(Iface::Service, skeleton)?,
        })
    }

    /// Stub advertising a caller-supplied hostname over the skeleton's
    /// port.
    pub fn for_skeleton_with_host(
        skeleton: &Skeleton,
        hostname: &str,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            target: Target::for_skeleton_with_host(Iface::Service, skeleton, hostname)?,
        })
    }

    /// Stub for the well-known service address of a remote naming server;
    /// the client bootstrap factory.
    #[must_use]
    pub fn for_address(addr: SocketAddr, connector: Arc<Connector>) -> Self {
        Self {
            target: Target::for_address(Iface::Service, addr, connector),
        }
    }

    /// The remote address this stub connects to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.target.addr()
    }
}

impl Service for ServiceStub {
    fn is_directory(&self, path: &Path) -> Result<bool, RemoteError> {
        match self.target.invoke(RequestBody::IsDirectory {
            path: path.to_string(),
        })? {
            ResponseBody::IsDirectory { value } => Ok(value),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn list(&self, directory: &Path) -> Result<Vec<String>, RemoteError> {
        match self.target.invoke(RequestBody::List {
            path: directory.to_string(),
        })? {
            ResponseBody::List { names } => Ok(names),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn create_file(&self, path: &Path) -> Result<bool, RemoteError> {
        match self.target.invoke(RequestBody::CreateFile {
            path: path.to_string(),
        })? {
            ResponseBody::CreateFile { created } => Ok(created),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn create_directory(&self, path: &Path) -> Result<bool, RemoteError> {
        match self.target.invoke(RequestBody::CreateDirectory {
            path: path.to_string(),
        })? {
            ResponseBody::CreateDirectory { created } => Ok(created),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn delete(&self, path: &Path) -> Result<bool, RemoteError> {
        match self.target.invoke(RequestBody::DeleteEntry {
            path: path.to_string(),
        })? {
            ResponseBody::DeleteEntry { deleted } => Ok(deleted),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn get_storage(&self, path: &Path) -> Result<StorageStub, RemoteError> {
        match self.target.invoke(RequestBody::GetStorage {
            path: path.to_string(),
        })? {
            ResponseBody::GetStorage { stub } => {
                StorageStub::from_ref(&stub, self.target.connector())
            }
            other => Err(unexpected_reply(&other)),
        }
    }
}

/// Forwarder implementing [`Registration`] against a remote naming
/// server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationStub {
    target: Target,
}

impl RegistrationStub {
    /// Stub for a skeleton in this process; adopts address and connector.
    pub fn for_skeleton(skeleton: &Skeleton) -> Result<Self, RemoteError> {
        Ok(Self {
            target: Target::for_skeleton(Iface::Registration, skeleton)?,
        })
    }

    /// Stub advertising a caller-supplied hostname over the skeleton's
    /// port.
    pub fn for_skeleton_with_host(
        skeleton: &Skeleton,
        hostname: &str,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            target: Target::for_skeleton_with_host(Iface::Registration, skeleton, hostname)?,
        })
    }

    /// Stub for the well-known registration address of a remote naming
    /// server; the storage-server bootstrap factory.
    #[must_use]
    pub fn for_address(addr: SocketAddr, connector: Arc<Connector>) -> Self {
        Self {
            target: Target::for_address(Iface::Registration, addr, connector),
        }
    }

    /// The remote address this stub connects to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.target.addr()
    }
}

impl Registration for RegistrationStub {
    fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, RemoteError> {
        match self.target.invoke(RequestBody::Register {
            storage: storage.to_ref(),
            command: command.to_ref(),
            files: files.iter().map(Path::to_string).collect(),
        })? {
            ResponseBody::Register { evict } => evict
                .iter()
                .map(|raw| raw.parse::<Path>().map_err(RemoteError::from))
                .collect(),
            other => Err(unexpected_reply(&other)),
        }
    }
}
