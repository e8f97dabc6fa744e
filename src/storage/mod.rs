// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-02-02

//! Storage-server interfaces and their forwarder stubs.
//!
//! [`Storage`] is the client-facing byte interface, [`Command`] the
//! control interface the naming server drives. A storage server exposes
//! one skeleton per interface; the stub types here are the transportable
//! client halves.

use std::net::SocketAddr;
use std::sync::Arc;

use hivefs_wire::{Iface, RemoteError, RequestBody, ResponseBody, StubRef};

use crate::path::Path;
use crate::rmi::stub::{unexpected_reply, Target};
use crate::rmi::{Connector, Skeleton};

pub mod server;

pub use server::{StorageNode, StorageServer};

/// Byte operations against files hosted by one storage server.
pub trait Storage {
    /// Byte length of the file at `path`.
    fn size(&self, path: &Path) -> Result<i64, RemoteError>;

    /// Read `length` bytes starting at `offset`.
    fn read(&self, path: &Path, offset: i64, length: i32) -> Result<Vec<u8>, RemoteError>;

    /// Write `data` starting at `offset`, extending the file as needed.
    fn write(&self, path: &Path, offset: i64, data: &[u8]) -> Result<(), RemoteError>;
}

/// Control operations the naming server issues to a storage server.
pub trait Command {
    /// Create an empty file, making parent directories on the way.
    /// `false` for root or an existing entry.
    fn create(&self, path: &Path) -> Result<bool, RemoteError>;

    /// Remove a file or directory subtree. `false` for root or a missing
    /// entry.
    fn delete(&self, path: &Path) -> Result<bool, RemoteError>;
}

/// Forwarder implementing [`Storage`] against a remote skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageStub {
    target: Target,
}

impl StorageStub {
    /// Stub for a skeleton in this process; adopts address and connector.
    pub fn for_skeleton(skeleton: &Skeleton) -> Result<Self, RemoteError> {
        Ok(Self {
            target: Target::for_skeleton(Iface::Storage, skeleton)?,
        })
    }

    /// Stub advertising a caller-supplied hostname over the skeleton's
    /// port.
    pub fn for_skeleton_with_host(
        skeleton: &Skeleton,
        hostname: &str,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            target: Target::for_skeleton_with_host(Iface::Storage, skeleton, hostname)?,
        })
    }

    /// Stub for a raw remote address.
    #[must_use]
    pub fn for_address(addr: SocketAddr, connector: Arc<Connector>) -> Self {
        Self {
            target: Target::for_address(Iface::Storage, addr, connector),
        }
    }

    /// Rebuild from the wire form.
    pub fn from_ref(stub: &StubRef, connector: Arc<Connector>) -> Result<Self, RemoteError> {
        if stub.iface != Iface::Storage {
            return Err(RemoteError::remote_invocation(format!(
                "expected a storage stub, got {}",
                stub.iface
            )));
        }
        Ok(Self {
            target: Target::from_ref(stub, connector)?,
        })
    }

    /// The wire form of this stub.
    #[must_use]
    pub fn to_ref(&self) -> StubRef {
        self.target.to_ref()
    }

    /// The remote address this stub connects to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.target.addr()
    }
}

impl Storage for StorageStub {
    fn size(&self, path: &Path) -> Result<i64, RemoteError> {
        match self.target.invoke(RequestBody::Size {
            path: path.to_string(),
        })? {
            ResponseBody::Size { size } => Ok(size),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn read(&self, path: &Path, offset: i64, length: i32) -> Result<Vec<u8>, RemoteError> {
        match self.target.invoke(RequestBody::Read {
            path: path.to_string(),
            offset,
            length,
        })? {
            ResponseBody::Read { data } => Ok(data),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn write(&self, path: &Path, offset: i64, data: &[u8]) -> Result<(), RemoteError> {
        match self.target.invoke(RequestBody::Write {
            path: path.to_string(),
            offset,
            data: data.to_vec(),
        })? {
            ResponseBody::Write => Ok(()),
            other => Err(unexpected_reply(&other)),
        }
    }
}

/// Forwarder implementing [`Command`] against a remote skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandStub {
    target: Target,
}

impl CommandStub {
    /// Stub for a skeleton in this process; adopts address and connector.
    pub fn for_skeleton(skeleton: &Skeleton) -> Result<Self, RemoteError> {
        Ok(Self {
            target: Target::for_skeleton(Iface::Command, skeleton)?,
        })
    }

    /// Stub advertising a caller-supplied hostname over the skeleton's
    /// port.
    pub fn for_skeleton_with_host(
        skeleton: &Skeleton,
        hostname: &str,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            target: Target::for_skeleton_with_host(Iface::Command, skeleton, hostname)?,
        })
    }

    /// Stub for a raw remote address.
    #[must_use]
    pub fn for_address(addr: SocketAddr, connector: Arc<Connector>) -> Self {
        Self {
            target: Target::for_address(Iface::Command, addr, connector),
        }
    }

    /// Rebuild from the wire form.
    pub fn from_ref(stub: &StubRef, connector: Arc<Connector>) -> Result<Self, RemoteError> {
        if stub.iface != Iface::Command {
            return Err(RemoteError::remote_invocation(format!(
                "expected a command stub, got {}",
                stub.iface
            )));
        }
        Ok(Self {
            target: Target::from_ref(stub, connector)?,
        })
    }

    /// The wire form of this stub.
    #[must_use]
    pub fn to_ref(&self) -> StubRef {
        self.target.to_ref()
    }

    /// The remote address this stub connects to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.target.addr()
    }
}

impl Command for CommandStub {
    fn create(&self, path: &Path) -> Result<bool, RemoteError> {
        match self.target.invoke(RequestBody::Create {
            path: path.to_string(),
        })? {
            ResponseBody::Create { created } => Ok(created),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn delete(&self, path: &Path) -> Result<bool, RemoteError> {
        match self.target.invoke(RequestBody::Remove {
            path: path.to_string(),
        })? {
            ResponseBody::Remove { deleted } => Ok(deleted),
            other => Err(unexpected_reply(&other)),
        }
    }
}
