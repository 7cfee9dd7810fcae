//! Tests against a live Redis server.
//!
//! Uses database 9 on `localhost:6379` (override with `REDIS_TEST_HOST` /
//! `REDIS_TEST_PORT`). Refuses to run against a non-empty database, and
//! removes every key it wrote.
//!
//! ```bash
//! cargo test -p redismount-core --features redis-tests --test redis_store_tests
//! ```

#![cfg(feature = "redis-tests")]

use std::sync::Arc;

use parking_lot::Mutex;
use redismount_core::{
    DirEntry, FsPath, KeyScan, KeyspaceFs, KeyspaceOptions, KvStore, NodeKind, RedisStore,
    StoreConfig, StoreError,
};

const TEST_DB: i64 = 9;

// Tests share one database, so they run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

fn config() -> StoreConfig {
    let host = std::env::var("REDIS_TEST_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("REDIS_TEST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6379);
    StoreConfig::new(host, port).with_db(TEST_DB)
}

fn connect(key_scan: KeyScan) -> RedisStore {
    let store = RedisStore::connect(&config().with_key_scan(key_scan))
        .expect("redis-tests requires a Redis server");
    assert!(
        store.keys("*").unwrap().is_empty(),
        "test database {TEST_DB} is not empty; refusing to run"
    );
    store
}

fn cleanup(store: &RedisStore) {
    for key in store.keys("*").unwrap() {
        store.del(&key).unwrap();
    }
}

#[test]
fn test_primitives() {
    let _guard = SERIAL.lock();
    let store = connect(KeyScan::Keys);
    store.ping().unwrap();

    assert_eq!(store.get("rm:a").unwrap(), None);
    store.set("rm:a", b"\x00binary\xff").unwrap();
    assert_eq!(store.get("rm:a").unwrap().unwrap(), b"\x00binary\xff");
    assert!(store.exists("rm:a").unwrap());
    assert_eq!(store.keys("rm:*").unwrap(), vec!["rm:a".to_string()]);
    assert!(store.del("rm:a").unwrap());
    assert!(!store.del("rm:a").unwrap());

    cleanup(&store);
}

#[test]
fn test_binary_key_does_not_break_listings() {
    let _guard = SERIAL.lock();
    let store = connect(KeyScan::Keys);
    let cfg = config();
    let client = redis::Client::open(format!("redis://{}/{TEST_DB}", cfg.addr())).unwrap();
    let mut raw = client.get_connection().unwrap();
    let binary_key: &[u8] = b"\xff:x";
    let _: () = redis::cmd("SET").arg(binary_key).arg("1").query(&mut raw).unwrap();
    store.set("ok:y", b"2").unwrap();

    assert_eq!(store.keys("*").unwrap(), vec!["ok:y".to_string()]);
    let fs = KeyspaceFs::new(Arc::new(store), KeyspaceOptions::default());
    assert_eq!(fs.read_dir(&FsPath::root()).unwrap(), vec![DirEntry::dir("ok")]);

    let _: i64 = redis::cmd("DEL").arg(binary_key).query(&mut raw).unwrap();
    cleanup(fs.store());
}

#[test]
fn test_cursor_scan_matches_keys() {
    let _guard = SERIAL.lock();
    let store = connect(KeyScan::Cursor { count: 3 });
    for i in 0..25 {
        store.set(&format!("scan:{i}"), b"v").unwrap();
    }
    store.set("other", b"v").unwrap();

    let mut keys = store.keys("scan:*").unwrap();
    keys.sort();
    assert_eq!(keys.len(), 25);
    assert!(keys.iter().all(|k| k.starts_with("scan:")));

    cleanup(&store);
}

#[test]
fn test_keyspace_over_redis() {
    let _guard = SERIAL.lock();
    let store = Arc::new(connect(KeyScan::Keys));
    let fs = KeyspaceFs::new(Arc::clone(&store), KeyspaceOptions::default());

    fs.mkdir(&FsPath::new("a")).unwrap();
    let file = fs.create(&FsPath::new("a/b")).unwrap();
    file.write(0, b"hello").unwrap();
    file.write(10, b"Z").unwrap();

    assert_eq!(fs.read_dir(&FsPath::root()).unwrap(), vec![DirEntry::dir("a")]);
    assert_eq!(
        fs.resolve(&FsPath::new("a/b")).unwrap(),
        NodeKind::File { size: 11 }
    );
    assert_eq!(store.get("a:b").unwrap().unwrap(), b"hello\0\0\0\0\0Z");

    fs.rmdir(&FsPath::new("a")).unwrap();
    assert!(store.keys("*").unwrap().is_empty());
}

#[test]
fn test_bad_password_is_auth_error() {
    let _guard = SERIAL.lock();
    let result = RedisStore::connect(&config().with_password("definitely-not-the-password"));
    if let Err(err) = result {
        assert!(err.is_connection_error());
        assert!(matches!(err, StoreError::Auth { .. }));
    }
}
