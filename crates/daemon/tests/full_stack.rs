//! End-to-end test of the config-to-protocol-server wiring this crate owns:
//! a TOML config resolves into a `ManagerConfig`, the manager indexes a
//! fixture tree, and a real client talks to it over a `UnixListener` —
//! matching the teacher's convention of a `run_daemon_*` integration test
//! driving the daemon over a real socket rather than calling handlers
//! in-process.

use fsal_daemon::FsalConfig;
use fsal_manager::{FsDbManager, ManagerConfig, StoreLocation};
use fsal_test_support::TempTree;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::watch;

/// `manager.refresh()` only schedules the walk; poll until the root
/// listing is non-empty rather than racing the scheduler's single worker.
async fn wait_until_indexed(manager: &FsDbManager) {
    for _ in 0..100 {
        if let Ok((true, children)) = manager.list_dir(".").await {
            if !children.is_empty() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("catalog was not populated by a scheduled refresh in time");
}

#[tokio::test]
async fn config_file_resolves_into_a_working_manager_and_socket() {
    let tree = TempTree::new().file("a.txt", b"abc").dir("d").file("d/b.txt", b"hello");
    let socket_dir = tempfile::tempdir().unwrap();
    let socket_path = socket_dir.path().join("fsald.sock");
    let pid_path = socket_dir.path().join("fsald.pid");

    let toml = format!(
        "[fsal]\nbasepaths = [\"{}\"]\n\n[socket]\npath = \"{}\"\n",
        tree.path().display(),
        socket_path.display(),
    );
    let config_path = socket_dir.path().join("fsald.toml");
    std::fs::write(&config_path, toml).unwrap();

    let config = FsalConfig::load(Some(&config_path)).unwrap();
    let resolved = config.resolve(&pid_path).unwrap();
    assert_eq!(resolved.socket_path, socket_path);

    let manager_config = ManagerConfig {
        base_paths: resolved.base_paths,
        chroot: resolved.chroot,
        blacklist_patterns: resolved.blacklist_patterns,
        whitelist_prefixes: Vec::new(),
        bundles_dir: resolved.bundles_dir,
        bundles_exts: resolved.bundles_exts,
        store: StoreLocation::InMemory,
        events_capacity: resolved.events_capacity,
        walker: resolved.walker,
        fifo_capacity: 1024,
        prune_batch_size: 1000,
    };

    let (manager, _join) = FsDbManager::open(manager_config).await.unwrap();
    manager.refresh();
    wait_until_indexed(&manager).await;

    let (_tx, rx) = watch::channel(false);
    let socket_path_clone = resolved.socket_path.clone();
    let server = tokio::spawn(async move { fsal_protocol::serve(manager, &socket_path_clone, rx).await });

    for _ in 0..50 {
        if resolved.socket_path.exists() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let mut client = UnixStream::connect(&resolved.socket_path).await.unwrap();
    let request = b"<request><command><type>LIST_DIR</type><params><path>.</path></params></command></request>\0";
    client.write_all(request).await.unwrap();

    let mut response = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        client.read_exact(&mut byte).await.unwrap();
        if byte[0] == 0 {
            break;
        }
        response.push(byte[0]);
    }
    let xml = String::from_utf8(response).unwrap();
    assert!(xml.contains("<success>true</success>"));
    assert!(xml.contains("<rel-path>d</rel-path>") || xml.contains("d"));

    server.abort();
}
