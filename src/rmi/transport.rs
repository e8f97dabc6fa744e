// CLASSIFICATION: COMMUNITY
// Filename: transport.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-01-18

//! Call transport: one request/reply exchange per invocation.
//!
//! A [`Connector`] carries the in-process bypass table. Skeletons started
//! through a connector register their dispatch handler under their bound
//! address; an invocation whose target is in the table runs the handler
//! directly and never touches a socket. Everything else goes over TCP.
//! The table is owned by the connector instance, so two connectors in one
//! process are fully independent.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use hivefs_wire::{
    decode_response, encode_request, Iface, RemoteError, Request, RequestBody, Response,
    ResponseBody, MAX_FRAME,
};

/// Type-erased dispatch side of a remote interface.
///
/// Implementations decode nothing themselves; they receive the already
/// decoded operation and run it against the local object.
pub trait RemoteHandler: Send + Sync {
    /// The interface this handler dispatches for.
    fn iface(&self) -> Iface;

    /// Run one operation. An `Err` becomes the error reply on the wire.
    fn handle(&self, body: RequestBody) -> Result<ResponseBody, RemoteError>;
}

/// Shared call transport with an in-process bypass registry.
pub struct Connector {
    local: Mutex<HashMap<SocketAddr, Arc<dyn RemoteHandler>>>,
    next_tag: AtomicU16,
}

impl Connector {
    /// Create a transport with an empty bypass table.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            local: Mutex::new(HashMap::new()),
            next_tag: AtomicU16::new(1),
        })
    }

    pub(crate) fn bind_local(&self, addr: SocketAddr, handler: Arc<dyn RemoteHandler>) {
        debug!("transport: local binding for {addr}");
        self.local.lock().expect("bypass table poisoned").insert(addr, handler);
    }

    pub(crate) fn unbind_local(&self, addr: &SocketAddr) {
        debug!("transport: local binding for {addr} removed");
        self.local.lock().expect("bypass table poisoned").remove(addr);
    }

    /// Whether the address is served by a skeleton on this connector.
    #[must_use]
    pub fn is_local(&self, addr: &SocketAddr) -> bool {
        self.local.lock().expect("bypass table poisoned").contains_key(addr)
    }

    /// Perform one invocation against `addr` and return the reply payload.
    ///
    /// An error reply is rethrown as its carried [`RemoteError`]; every
    /// transport-level failure maps to `RemoteInvocation`.
    pub fn invoke(
        &self,
        addr: SocketAddr,
        iface: Iface,
        body: RequestBody,
    ) -> Result<ResponseBody, RemoteError> {
        if body.iface() != iface {
            return Err(RemoteError::remote_invocation(format!(
                "{} operation sent through a {} stub",
                body.iface(),
                iface
            )));
        }
        let handler = self.local.lock().expect("bypass table poisoned").get(&addr).cloned();
        if let Some(handler) = handler {
            trace!("transport: in-process call to {addr}");
            if handler.iface() != iface {
                return Err(RemoteError::remote_invocation(format!(
                    "skeleton at {addr} serves {}, not {}",
                    handler.iface(),
                    iface
                )));
            }
            return handler.handle(body);
        }
        self.exchange(addr, body)
    }

    fn exchange(&self, addr: SocketAddr, body: RequestBody) -> Result<ResponseBody, RemoteError> {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed).max(1);
        let frame = encode_request(&Request { tag, body })
            .map_err(|err| RemoteError::remote_invocation(format!("encode failed: {err}")))?;
        trace!("transport: tcp call to {addr}, tag {tag}");
        let mut stream = TcpStream::connect(addr)
            .map_err(|err| RemoteError::remote_invocation(format!("connect {addr}: {err}")))?;
        stream
            .write_all(&frame)
            .and_then(|()| stream.flush())
            .map_err(|err| RemoteError::remote_invocation(format!("send to {addr}: {err}")))?;
        let reply = read_frame(&mut stream)
            .map_err(|err| RemoteError::remote_invocation(format!("receive from {addr}: {err}")))?;
        let Response { tag: reply_tag, body } = decode_response(&reply)
            .map_err(|err| RemoteError::remote_invocation(format!("decode failed: {err}")))?;
        if reply_tag != tag {
            return Err(RemoteError::remote_invocation(format!(
                "reply tag {reply_tag} does not answer call tag {tag}"
            )));
        }
        match body {
            ResponseBody::Error { kind, message } => Err(RemoteError::new(kind, message)),
            payload => Ok(payload),
        }
    }
}

/// Read exactly one size-prefixed frame from a stream.
pub(crate) fn read_frame(stream: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header)?;
    let size = u32::from_le_bytes(header);
    if size < 5 || size > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {size} bytes refused"),
        ));
    }
    let mut frame = vec![0u8; size as usize];
    frame[..4].copy_from_slice(&header);
    stream.read_exact(&mut frame[4..])?;
    Ok(frame)
}
