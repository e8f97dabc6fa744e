// CLASSIFICATION: COMMUNITY
// Filename: rmi_substrate.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-02-14

//! Skeleton and stub behaviour over real sockets and in-process.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use serial_test::serial;

use hivefs::rmi::{Connector, RemoteHandler, Skeleton, SkeletonHooks};
use hivefs::wire::{ErrorKind, Iface, RemoteError, RequestBody, ResponseBody};
use hivefs::{Command, Path, Storage, StorageStub};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Storage-interface handler that answers `size` with a fixed value and
/// refuses everything else; enough to drive the substrate without disks.
struct FixedSize(i64);

impl RemoteHandler for FixedSize {
    fn iface(&self) -> Iface {
        Iface::Storage
    }

    fn handle(&self, body: RequestBody) -> Result<ResponseBody, RemoteError> {
        match body {
            RequestBody::Size { .. } => Ok(ResponseBody::Size { size: self.0 }),
            _ => Err(RemoteError::not_found("fixture only answers size")),
        }
    }
}

fn fixture(size: i64) -> (Skeleton, Arc<Connector>) {
    let connector = Connector::new();
    let skeleton = Skeleton::new(Arc::new(FixedSize(size)), Arc::clone(&connector));
    (skeleton, connector)
}

#[test]
#[serial]
fn lifecycle_start_stop_restart() -> Result<()> {
    init_logs();
    let (skeleton, _connector) = fixture(1);
    assert!(!skeleton.is_running());
    assert!(skeleton.address().is_none());

    skeleton.start()?;
    assert!(skeleton.is_running());
    let first_addr = skeleton.address().expect("running skeleton has an address");
    let err = skeleton.start().unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalState);

    skeleton.stop();
    assert!(!skeleton.is_running());

    // A stopped skeleton may be pointed elsewhere and started again.
    skeleton.set_address("127.0.0.1", None)?;
    skeleton.start()?;
    assert!(skeleton.is_running());
    assert_ne!(skeleton.address(), Some(first_addr));
    skeleton.stop();
    Ok(())
}

#[test]
#[serial]
fn stopped_hook_fires_exactly_once() -> Result<()> {
    init_logs();
    struct CountStops(AtomicUsize);
    impl SkeletonHooks for CountStops {
        fn stopped(&self, _cause: Option<&std::io::Error>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let (skeleton, _connector) = fixture(1);
    let hooks = Arc::new(CountStops(AtomicUsize::new(0)));
    skeleton.set_hooks(Arc::clone(&hooks) as Arc<dyn SkeletonHooks>);
    skeleton.start()?;
    skeleton.stop();
    skeleton.stop();
    assert_eq!(hooks.0.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
#[serial]
fn calls_travel_over_tcp_between_connectors() -> Result<()> {
    init_logs();
    let (skeleton, _server_side) = fixture(77);
    skeleton.start()?;
    let addr = skeleton.address().expect("bound");

    // A fresh connector has no local binding for the address, so this
    // stub must go through the socket.
    let client_side = Connector::new();
    assert!(!client_side.is_local(&addr));
    let stub = StorageStub::for_address(addr, client_side);
    let file: Path = "/anything".parse()?;
    assert_eq!(stub.size(&file)?, 77);

    let err = stub.read(&file, 0, 1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    skeleton.stop();
    Ok(())
}

#[test]
#[serial]
fn colocated_calls_bypass_the_socket() -> Result<()> {
    init_logs();
    let (skeleton, connector) = fixture(5);
    skeleton.start()?;
    let addr = skeleton.address().expect("bound");
    assert!(connector.is_local(&addr));

    let stub = StorageStub::for_skeleton(&skeleton)?;
    assert_eq!(stub.size(&"/x".parse::<Path>()?)?, 5);

    skeleton.stop();
    assert!(!connector.is_local(&addr));
    let err = stub.size(&"/x".parse::<Path>()?).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RemoteInvocation);
    Ok(())
}

#[test]
#[serial]
fn concurrent_callers_share_one_skeleton() -> Result<()> {
    init_logs();
    let (skeleton, _server_side) = fixture(13);
    skeleton.start()?;
    let addr = skeleton.address().expect("bound");

    let mut workers = Vec::new();
    for _ in 0..8 {
        workers.push(thread::spawn(move || {
            let stub = StorageStub::for_address(addr, Connector::new());
            stub.size(&"/f".parse::<Path>().unwrap())
        }));
    }
    for worker in workers {
        assert_eq!(worker.join().expect("worker panicked")?, 13);
    }
    skeleton.stop();
    Ok(())
}

#[test]
#[serial]
fn foreign_interface_calls_are_rejected() -> Result<()> {
    init_logs();
    let (skeleton, _server_side) = fixture(1);
    skeleton.start()?;
    let addr = skeleton.address().expect("bound");

    // A command stub aimed at a storage skeleton: the call decodes, but
    // dispatch refuses it.
    let wrong = hivefs::CommandStub::for_address(addr, Connector::new());
    let err = wrong.create(&"/f".parse::<Path>()?).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RemoteInvocation);
    skeleton.stop();
    Ok(())
}

#[test]
#[serial]
fn hostname_override_keeps_the_skeleton_port() -> Result<()> {
    init_logs();
    let (skeleton, _connector) = fixture(3);
    skeleton.start()?;
    let port = skeleton.address().expect("bound").port();

    let stub = StorageStub::for_skeleton_with_host(&skeleton, "127.0.0.1")?;
    assert_eq!(stub.addr().port(), port);
    assert_eq!(stub.size(&"/f".parse::<Path>()?)?, 3);

    let err = StorageStub::for_skeleton_with_host(&skeleton, "").unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalState);
    skeleton.stop();
    Ok(())
}

#[test]
fn stubs_for_unstarted_unaddressed_skeletons_are_refused() {
    let (skeleton, _connector) = fixture(1);
    let err = StorageStub::for_skeleton(&skeleton).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalState);
}

#[test]
fn stub_equality_follows_interface_and_address() -> Result<()> {
    let connector = Connector::new();
    let addr: SocketAddr = ([127, 0, 0, 1], 50200).into();
    let one = StorageStub::for_address(addr, Arc::clone(&connector));
    let two = StorageStub::for_address(addr, Connector::new());
    assert_eq!(one, two);

    let elsewhere = StorageStub::for_address(([127, 0, 0, 1], 50201).into(), connector);
    assert_ne!(one, elsewhere);

    let mut set = HashSet::new();
    set.insert(one.clone());
    assert!(set.contains(&two));

    // Equality survives the wire form.
    let rebuilt = StorageStub::from_ref(&one.to_ref(), Connector::new())?;
    assert_eq!(rebuilt, one);
    Ok(())
}
