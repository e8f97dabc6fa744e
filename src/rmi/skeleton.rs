// CLASSIFICATION: COMMUNITY
// Filename: skeleton.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-02-02

//! Invocation server: a multithreaded TCP dispatcher for one interface.
//!
//! A skeleton owns a listening socket and a handler. The listener runs on
//! its own thread; every accepted connection is served on a further
//! thread, so calls on one skeleton execute concurrently and the handler
//! must provide its own synchronization. A stopped skeleton may be
//! started again.

use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::{io, thread};

use log::{debug, error, info, warn};

use hivefs_wire::{
    decode_request, encode_response, Iface, RemoteError, Response, ResponseBody,
};

use crate::rmi::transport::{read_frame, Connector, RemoteHandler};

/// Ports handed to skeletons constructed without an address. Starts in
/// the dynamic range so unprivileged processes can always bind.
static NEXT_PORT: AtomicU16 = AtomicU16::new(49152);

pub(crate) fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}

/// Observer hooks for skeleton lifecycle events.
pub trait SkeletonHooks: Send + Sync {
    /// Top-level failure in the listening thread. Return `true` to keep
    /// accepting connections; the default stops the server.
    fn listen_error(&self, _error: &io::Error) -> bool {
        false
    }

    /// Advisory notification of a failure while serving one connection.
    fn service_error(&self, _error: &RemoteError) {}

    /// The listener has exited. `cause` is the terminating error, or
    /// `None` after an explicit stop. Fires exactly once per start.
    fn stopped(&self, _cause: Option<&io::Error>) {}
}

/// Hook implementation with the default behaviour for every event.
pub struct DefaultHooks;

impl SkeletonHooks for DefaultHooks {}

struct State {
    address: Option<SocketAddr>,
    // Whether the port came from the counter rather than the caller.
    auto_port: bool,
    bound: Option<SocketAddr>,
    listener: Option<JoinHandle<()>>,
}

/// Network-side dispatcher binding one interface to one implementation.
pub struct Skeleton {
    handler: Arc<dyn RemoteHandler>,
    hooks: Mutex<Arc<dyn SkeletonHooks>>,
    connector: Arc<Connector>,
    state: Mutex<State>,
    running: Arc<AtomicBool>,
}

impl Skeleton {
    /// Create a skeleton with no address yet. A port from the process-wide
    /// counter is assigned when `start` runs.
    pub fn new(handler: Arc<dyn RemoteHandler>, connector: Arc<Connector>) -> Self {
        Self {
            handler,
            hooks: Mutex::new(Arc::new(DefaultHooks)),
            connector,
            state: Mutex::new(State {
                address: None,
                auto_port: false,
                bound: None,
                listener: None,
            }),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a skeleton bound to a caller-chosen address; used for the
    /// well-known naming ports.
    pub fn with_address(
        handler: Arc<dyn RemoteHandler>,
        connector: Arc<Connector>,
        address: SocketAddr,
    ) -> Self {
        let skeleton = Self::new(handler, connector);
        skeleton.state.lock().expect("skeleton state poisoned").address = Some(address);
        skeleton
    }

    /// Replace the lifecycle hooks. Only sensible before `start`.
    pub fn set_hooks(&self, hooks: Arc<dyn SkeletonHooks>) {
        *self.hooks.lock().expect("skeleton hooks poisoned") = hooks;
    }

    /// The interface this skeleton dispatches for.
    #[must_use]
    pub fn iface(&self) -> Iface {
        self.handler.iface()
    }

    pub(crate) fn connector(&self) -> Arc<Connector> {
        Arc::clone(&self.connector)
    }

    /// Point the skeleton at a host before starting it. With `port` of
    /// `None` the process-wide counter assigns one.
    pub fn set_address(&self, host: &str, port: Option<u16>) -> Result<(), RemoteError> {
        if self.is_running() {
            return Err(RemoteError::illegal_state(
                "cannot change the address of a running skeleton",
            ));
        }
        let auto = port.is_none();
        let port = port.unwrap_or_else(next_port);
        let resolved = (host, port)
            .to_socket_addrs()
            .map_err(|err| RemoteError::remote_invocation(format!("resolve {host}: {err}")))?
            .next()
            .ok_or_else(|| RemoteError::remote_invocation(format!("no address for {host}")))?;
        let mut state = self.state.lock().expect("skeleton state poisoned");
        state.address = Some(resolved);
        state.auto_port = auto;
        Ok(())
    }

    /// The effective address: the bound one while running, otherwise the
    /// configured one.
    #[must_use]
    pub fn address(&self) -> Option<SocketAddr> {
        let state = self.state.lock().expect("skeleton state poisoned");
        state.bound.or(state.address)
    }

    /// Whether the listener is currently accepting connections.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Bind the listening socket, spawn the accept loop, and return.
    ///
    /// Fails with `IllegalState` when already running and with
    /// `RemoteInvocation` when the socket cannot be bound.
    pub fn start(&self) -> Result<(), RemoteError> {
        let mut state = self.state.lock().expect("skeleton state poisoned");
        if self.running.load(Ordering::Acquire) {
            return Err(RemoteError::illegal_state("skeleton already running"));
        }
        if state.address.is_none() {
            state.address = Some(SocketAddr::from((Ipv4Addr::LOCALHOST, next_port())));
            state.auto_port = true;
        }
        let mut address = state.address.expect("address assigned above");
        // A counter-assigned port can land on a socket still draining in
        // the kernel; move on to the next counter value instead of
        // failing. Caller-chosen ports fail hard.
        let mut attempts = 0;
        let listener = loop {
            match TcpListener::bind(address) {
                Ok(listener) => break listener,
                Err(err)
                    if state.auto_port
                        && err.kind() == io::ErrorKind::AddrInUse
                        && attempts < 16 =>
                {
                    attempts += 1;
                    address.set_port(next_port());
                }
                Err(err) => {
                    return Err(RemoteError::remote_invocation(format!(
                        "bind {address}: {err}"
                    )))
                }
            }
        };
        state.address = Some(address);
        let bound = listener
            .local_addr()
            .map_err(|err| RemoteError::remote_invocation(format!("local addr: {err}")))?;
        info!("skeleton: {} interface listening on {bound}", self.iface());
        state.bound = Some(bound);
        self.running.store(true, Ordering::Release);
        self.connector.bind_local(bound, Arc::clone(&self.handler));

        let handler = Arc::clone(&self.handler);
        let hooks = Arc::clone(&self.hooks.lock().expect("skeleton hooks poisoned"));
        let running = Arc::clone(&self.running);
        let connector = self.connector();
        state.listener = Some(thread::spawn(move || {
            let cause = accept_loop(&listener, &handler, &hooks, &running);
            connector.unbind_local(&bound);
            running.store(false, Ordering::Release);
            hooks.stopped(cause.as_ref());
        }));
        Ok(())
    }

    /// Stop accepting connections and wait for the listener to exit.
    ///
    /// Connections already being served drain on their own threads. After
    /// this returns the skeleton may be started again.
    pub fn stop(&self) {
        let (bound, listener) = {
            let mut state = self.state.lock().expect("skeleton state poisoned");
            (state.bound.take(), state.listener.take())
        };
        self.running.store(false, Ordering::Release);
        if let Some(addr) = bound {
            // The acceptor blocks in accept(); a throwaway connection
            // wakes it so it can observe the cleared flag.
            if let Err(err) = TcpStream::connect(addr) {
                debug!("skeleton: wake connection to {addr} failed: {err}");
            }
        }
        if let Some(listener) = listener {
            if listener.join().is_err() {
                error!("skeleton: listener thread panicked");
            }
        }
    }
}

fn accept_loop(
    listener: &TcpListener,
    handler: &Arc<dyn RemoteHandler>,
    hooks: &Arc<dyn SkeletonHooks>,
    running: &Arc<AtomicBool>,
) -> Option<io::Error> {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                if !running.load(Ordering::Acquire) {
                    return None;
                }
                debug!("skeleton: accepted connection from {peer}");
                let handler = Arc::clone(handler);
                let hooks = Arc::clone(hooks);
                thread::spawn(move || serve_connection(stream, &handler, &hooks));
            }
            Err(error) => {
                if !running.load(Ordering::Acquire) {
                    return None;
                }
                if hooks.listen_error(&error) {
                    continue;
                }
                warn!("skeleton: accept failed, shutting down: {error}");
                return Some(error);
            }
        }
    }
}

fn serve_connection(
    mut stream: TcpStream,
    handler: &Arc<dyn RemoteHandler>,
    hooks: &Arc<dyn SkeletonHooks>,
) {
    let (tag, body) = match read_frame(&mut stream).map_err(|err| {
        RemoteError::remote_invocation(format!("unreadable request: {err}"))
    }) {
        Ok(frame) => match decode_request(&frame) {
            Ok(request) => {
                let tag = request.tag;
                if request.body.iface() == handler.iface() {
                    match handler.handle(request.body) {
                        Ok(reply) => (tag, reply),
                        Err(err) => (tag, ResponseBody::from(err)),
                    }
                } else {
                    let err = RemoteError::remote_invocation(format!(
                        "{} operation sent to {} skeleton",
                        request.body.iface(),
                        handler.iface()
                    ));
                    hooks.service_error(&err);
                    (tag, ResponseBody::from(err))
                }
            }
            Err(err) => {
                let err =
                    RemoteError::remote_invocation(format!("undecodable request: {err}"));
                hooks.service_error(&err);
                (0, ResponseBody::from(err))
            }
        },
        Err(err) => {
            hooks.service_error(&err);
            return;
        }
    };

    let frame = encode_response(&Response { tag, body }).unwrap_or_else(|err| {
        let fallback = Response {
            tag,
            body: ResponseBody::from(RemoteError::remote_invocation(format!(
                "reply encoding failed: {err}"
            ))),
        };
        encode_response(&fallback).expect("error replies always encode")
    });
    if let Err(err) = stream.write_all(&frame).and_then(|()| stream.flush()) {
        let err = RemoteError::remote_invocation(format!("reply send failed: {err}"));
        hooks.service_error(&err);
    }
}
