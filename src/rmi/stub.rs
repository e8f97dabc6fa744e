// CLASSIFICATION: COMMUNITY
// Filename: stub.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-02-02

//! Stub targets: the client half of remote invocation.
//!
//! Interfaces get concrete forwarder types rather than anything
//! synthesized at runtime; each of those wraps a [`Target`] carrying the
//! interface tag, the remote address, and the connector used to reach it.
//! Two stubs are interchangeable exactly when interface and address
//! match, so equality and hashing ignore the connector.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use log::warn;

use hivefs_wire::{Iface, RemoteError, RequestBody, ResponseBody, StubRef};

use crate::rmi::skeleton::Skeleton;
use crate::rmi::transport::Connector;

/// Address half of a concrete stub.
#[derive(Clone)]
pub struct Target {
    iface: Iface,
    addr: SocketAddr,
    connector: Arc<Connector>,
}

impl Target {
    /// Target a skeleton directly, adopting its address and connector.
    ///
    /// Fails with `IllegalState` when the skeleton has neither an
    /// assigned address nor a running listener. Probes connectivity once
    /// unless the skeleton is reachable in-process.
    pub fn for_skeleton(iface: Iface, skeleton: &Skeleton) -> Result<Self, RemoteError> {
        let addr = skeleton.address().ok_or_else(|| {
            RemoteError::illegal_state("skeleton has no address and is not running")
        })?;
        let target = Self {
            iface,
            addr,
            connector: skeleton.connector(),
        };
        if !target.connector.is_local(&addr) {
            // Advisory reachability probe; a refused connection here is
            // logged, not fatal, matching the bootstrap-friendly contract.
            if let Err(err) = TcpStream::connect(addr) {
                warn!("stub: probe of {addr} failed: {err}");
            }
        }
        Ok(target)
    }

    /// Target a skeleton's port under a caller-supplied hostname, for
    /// skeletons whose self-determined address is not externally
    /// routable.
    pub fn for_skeleton_with_host(
        iface: Iface,
        skeleton: &Skeleton,
        hostname: &str,
    ) -> Result<Self, RemoteError> {
        if hostname.is_empty() {
            return Err(RemoteError::illegal_state("hostname override is blank"));
        }
        let port = skeleton
            .address()
            .ok_or_else(|| RemoteError::illegal_state("skeleton has no assigned port"))?
            .port();
        let addr = resolve(hostname, port)?;
        Ok(Self {
            iface,
            addr,
            connector: skeleton.connector(),
        })
    }

    /// Target a raw address; the bootstrap factory.
    #[must_use]
    pub fn for_address(iface: Iface, addr: SocketAddr, connector: Arc<Connector>) -> Self {
        Self {
            iface,
            addr,
            connector,
        }
    }

    /// Rebuild a target from its wire form, reached via `connector`.
    pub fn from_ref(stub: &StubRef, connector: Arc<Connector>) -> Result<Self, RemoteError> {
        let addr = stub
            .addr
            .to_socket_addrs()
            .map_err(|err| {
                RemoteError::remote_invocation(format!("resolve {}: {err}", stub.addr))
            })?
            .next()
            .ok_or_else(|| {
                RemoteError::remote_invocation(format!("no address for {}", stub.addr))
            })?;
        Ok(Self {
            iface: stub.iface,
            addr,
            connector,
        })
    }

    /// The wire form of this target.
    #[must_use]
    pub fn to_ref(&self) -> StubRef {
        StubRef {
            iface: self.iface,
            addr: self.addr.to_string(),
        }
    }

    /// The remote address this target connects to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The interface this target speaks.
    #[must_use]
    pub fn iface(&self) -> Iface {
        self.iface
    }

    pub(crate) fn connector(&self) -> Arc<Connector> {
        Arc::clone(&self.connector)
    }

    pub(crate) fn invoke(&self, body: RequestBody) -> Result<ResponseBody, RemoteError> {
        self.connector.invoke(self.addr, self.iface, body)
    }
}

fn resolve(hostname: &str, port: u16) -> Result<SocketAddr, RemoteError> {
    (hostname, port)
        .to_socket_addrs()
        .map_err(|err| RemoteError::remote_invocation(format!("resolve {hostname}: {err}")))?
        .next()
        .ok_or_else(|| RemoteError::remote_invocation(format!("no address for {hostname}")))
}

/// A reply variant the caller did not ask for.
pub(crate) fn unexpected_reply(reply: &ResponseBody) -> RemoteError {
    RemoteError::remote_invocation(format!("unexpected reply variant: {reply:?}"))
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.iface == other.iface && self.addr == other.addr
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.iface.hash(state);
        self.addr.hash(state);
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("iface", &self.iface)
            .field("addr", &self.addr)
            .finish()
    }
}
