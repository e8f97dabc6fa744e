// CLASSIFICATION: COMMUNITY
// Filename: naming_service.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-02-20

//! Naming-server scenarios: bootstrap, eviction, placement and deletion.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serial_test::serial;
use tempfile::TempDir;

use hivefs::rmi::Connector;
use hivefs::wire::ErrorKind;
use hivefs::{NamingConfig, NamingServer, Path, Service, Storage, StorageServer};

static PORTS: AtomicU16 = AtomicU16::new(7400);

fn config() -> NamingConfig {
    let base = PORTS.fetch_add(2, Ordering::Relaxed);
    NamingConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        service_port: base,
        registration_port: base + 1,
    }
}

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scratch root pre-seeded with files at the given logical paths.
fn seeded_root(files: &[&str]) -> Result<TempDir> {
    let root = tempfile::tempdir()?;
    for file in files {
        let local = root.path().join(file.trim_start_matches('/'));
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(local, file.as_bytes())?;
    }
    Ok(root)
}

fn path(raw: &str) -> Path {
    raw.parse().expect("valid path")
}

#[test]
#[serial]
fn bootstrap_publishes_preexisting_files() -> Result<()> {
    init_logs();
    let naming = NamingServer::new(Connector::new(), config());
    naming.start()?;

    let root = seeded_root(&["/x", "/y"])?;
    let server = StorageServer::new(root.path(), Connector::new());
    server.start("127.0.0.1", &naming.registration_stub()?)?;

    // Nothing was known before, so nothing was evicted locally.
    assert!(root.path().join("x").exists());
    assert!(root.path().join("y").exists());

    let service = naming.service_stub()?;
    assert_eq!(service.list(&Path::root())?, vec!["x", "y"]);
    assert!(!service.is_directory(&path("/x"))?);
    assert_eq!(service.get_storage(&path("/x"))?, server.stubs()?.0);

    server.stop();
    naming.stop();
    Ok(())
}

#[test]
#[serial]
fn second_registration_evicts_duplicates_and_prunes() -> Result<()> {
    init_logs();
    let naming = NamingServer::new(Connector::new(), config());
    naming.start()?;

    let root_a = seeded_root(&["/x", "/sub/y"])?;
    let server_a = StorageServer::new(root_a.path(), Connector::new());
    server_a.start("127.0.0.1", &naming.registration_stub()?)?;

    let root_b = seeded_root(&["/sub/y", "/z"])?;
    let server_b = StorageServer::new(root_b.path(), Connector::new());
    server_b.start("127.0.0.1", &naming.registration_stub()?)?;

    // B lost the duplicate and the directory it left empty; A kept its copy.
    assert!(!root_b.path().join("sub").exists());
    assert!(root_b.path().join("z").exists());
    assert!(root_a.path().join("sub/y").exists());

    let service = naming.service_stub()?;
    assert_eq!(service.list(&Path::root())?, vec!["sub", "x", "z"]);
    assert_eq!(service.get_storage(&path("/sub/y"))?, server_a.stubs()?.0);
    assert_eq!(service.get_storage(&path("/z"))?, server_b.stubs()?.0);

    server_b.stop();
    server_a.stop();
    naming.stop();
    Ok(())
}

#[test]
#[serial]
fn a_server_registers_only_once() -> Result<()> {
    init_logs();
    let naming = NamingServer::new(Connector::new(), config());
    naming.start()?;

    let root = seeded_root(&[])?;
    let server = StorageServer::new(root.path(), Connector::new());
    let registration = naming.registration_stub()?;
    server.start("127.0.0.1", &registration)?;

    let (storage, command) = server.stubs()?;
    let err = hivefs::Registration::register(&registration, storage, command, vec![]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalState);

    server.stop();
    naming.stop();
    Ok(())
}

#[test]
#[serial]
fn create_and_delete_walk_the_tree() -> Result<()> {
    init_logs();
    let naming = NamingServer::new(Connector::new(), config());
    naming.start()?;

    let root = seeded_root(&[])?;
    let server = StorageServer::new(root.path(), Connector::new());
    server.start("127.0.0.1", &naming.registration_stub()?)?;
    let service = naming.service_stub()?;

    let err = service.create_file(&path("/d/f")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    assert!(service.create_directory(&path("/d"))?);
    assert!(!service.create_directory(&path("/d"))?);
    assert!(service.create_file(&path("/d/f"))?);
    assert!(!service.create_file(&path("/d/f"))?);
    assert!(root.path().join("d/f").exists());

    assert!(service.delete(&path("/d/f"))?);
    assert!(!root.path().join("d/f").exists());
    let err = service.get_storage(&path("/d/f")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(service.list(&path("/d"))?, Vec::<String>::new());

    let err = service.delete(&path("/ghost")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    server.stop();
    naming.stop();
    Ok(())
}

#[test]
#[serial]
fn placement_rotates_across_storage_servers() -> Result<()> {
    init_logs();
    let naming = NamingServer::new(Connector::new(), config());
    naming.start()?;

    let root_a = seeded_root(&[])?;
    let server_a = StorageServer::new(root_a.path(), Connector::new());
    server_a.start("127.0.0.1", &naming.registration_stub()?)?;
    let root_b = seeded_root(&[])?;
    let server_b = StorageServer::new(root_b.path(), Connector::new());
    server_b.start("127.0.0.1", &naming.registration_stub()?)?;

    let service = naming.service_stub()?;
    for name in ["/f1", "/f2", "/f3", "/f4"] {
        assert!(service.create_file(&path(name))?);
    }

    let stub_a = server_a.stubs()?.0;
    let stub_b = server_b.stubs()?.0;
    assert_eq!(service.get_storage(&path("/f1"))?, stub_a);
    assert_eq!(service.get_storage(&path("/f2"))?, stub_b);
    assert_eq!(service.get_storage(&path("/f3"))?, stub_a);
    assert_eq!(service.get_storage(&path("/f4"))?, stub_b);
    assert!(root_a.path().join("f1").exists());
    assert!(root_b.path().join("f2").exists());

    server_b.stop();
    server_a.stop();
    naming.stop();
    Ok(())
}

#[test]
#[serial]
fn directory_delete_reaches_every_involved_server() -> Result<()> {
    init_logs();
    let naming = NamingServer::new(Connector::new(), config());
    naming.start()?;

    let root_a = seeded_root(&["/share/a", "/keep"])?;
    let server_a = StorageServer::new(root_a.path(), Connector::new());
    server_a.start("127.0.0.1", &naming.registration_stub()?)?;
    let root_b = seeded_root(&["/share/b"])?;
    let server_b = StorageServer::new(root_b.path(), Connector::new());
    server_b.start("127.0.0.1", &naming.registration_stub()?)?;

    let service = naming.service_stub()?;
    assert!(service.delete(&path("/share"))?);
    assert!(!root_a.path().join("share").exists());
    assert!(!root_b.path().join("share").exists());
    assert!(root_a.path().join("keep").exists());
    assert_eq!(service.list(&Path::root())?, vec!["keep"]);

    server_b.stop();
    server_a.stop();
    naming.stop();
    Ok(())
}

#[test]
#[serial]
fn one_connector_keeps_the_whole_cluster_in_process() -> Result<()> {
    init_logs();
    let connector = Connector::new();
    let naming = NamingServer::new(Arc::clone(&connector), config());
    naming.start()?;

    let root = seeded_root(&["/x"])?;
    let server = StorageServer::new(root.path(), Arc::clone(&connector));
    server.start("127.0.0.1", &naming.registration_stub()?)?;

    let service = naming.service_stub()?;
    assert!(connector.is_local(&service.addr()));
    assert!(service.create_file(&path("/made"))?);
    assert_eq!(service.list(&Path::root())?, vec!["made", "x"]);

    let storage = service.get_storage(&path("/made"))?;
    storage.write(&path("/made"), 0, b"hive")?;
    assert_eq!(storage.read(&path("/made"), 0, 4)?, b"hive");

    server.stop();
    naming.stop();
    Ok(())
}
