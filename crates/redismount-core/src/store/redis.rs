use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

use super::KvStore;
use crate::config::{KeyScan, StoreConfig};
use crate::error::{StoreError, StoreResult};

/// A Redis server reached over a single connection.
///
/// The sync connection is not safe for concurrent use, so every command takes
/// the mutex for its whole round trip. Commands from concurrent filesystem
/// requests are therefore serialized; the server would serialize them anyway.
pub struct RedisStore {
    conn: Mutex<::redis::Connection>,
    key_scan: KeyScan,
    addr: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("addr", &self.addr)
            .field("key_scan", &self.key_scan)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Dial, authenticate and select the configured database.
    ///
    /// Any failure here is a connection error: nothing has been mounted yet
    /// and the caller should report it to the operator.
    pub fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let addr = config.addr();
        debug!(addr = %addr, db = config.db, "Connecting to Redis");

        let client = ::redis::Client::open((config.host.as_str(), config.port)).map_err(|source| {
            StoreError::Connect {
                addr: addr.clone(),
                source,
            }
        })?;
        let mut conn = client
            .get_connection_with_timeout(config.connect_timeout)
            .map_err(|source| StoreError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let io_timeout = Some(config.io_timeout);
        conn.set_read_timeout(io_timeout)
            .and_then(|()| conn.set_write_timeout(io_timeout))
            .map_err(|source| StoreError::Connect {
                addr: addr.clone(),
                source,
            })?;

        if let Some(password) = &config.password {
            ::redis::cmd("AUTH")
                .arg(password.as_str())
                .query::<()>(&mut conn)
                .map_err(|source| StoreError::Auth { source })?;
        }

        if config.db != 0 {
            ::redis::cmd("SELECT")
                .arg(config.db)
                .query::<()>(&mut conn)
                .map_err(|source| StoreError::Select {
                    db: config.db,
                    source,
                })?;
        }

        info!(addr = %addr, db = config.db, "Connected to Redis");
        Ok(Self {
            conn: Mutex::new(conn),
            key_scan: config.key_scan,
            addr,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Round-trip a `PING` to verify the connection is usable.
    pub fn ping(&self) -> StoreResult<()> {
        let reply: String = self.run("PING", "", |conn| ::redis::cmd("PING").query(conn))?;
        trace!(reply = %reply, "PING");
        Ok(())
    }

    /// Run one command with the connection held, logging failures.
    fn run<T>(
        &self,
        command: &'static str,
        key: &str,
        f: impl FnOnce(&mut ::redis::Connection) -> ::redis::RedisResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        f(&mut *conn).map_err(|source| {
            error!(command, key, error = %source, "Redis command failed");
            StoreError::command(command, key, source)
        })
    }

    fn scan(&self, pattern: &str, count: usize) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        // Hold the connection for the whole loop so another caller's command
        // cannot interleave with the cursor replies.
        let mut conn = self.conn.lock();
        loop {
            let (next, batch): (u64, Vec<Vec<u8>>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count)
                .query(&mut *conn)
                .map_err(|source| {
                    error!(command = "SCAN", pattern, error = %source, "Redis command failed");
                    StoreError::command("SCAN", pattern, source)
                })?;
            keys.extend(utf8_keys(batch));
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

impl KvStore for RedisStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        trace!(key, "GET");
        self.run("GET", key, |conn| ::redis::cmd("GET").arg(key).query(conn))
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        trace!(key, len = value.len(), "SET");
        self.run("SET", key, |conn| {
            ::redis::cmd("SET").arg(key).arg(value).query(conn)
        })
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        trace!(key, "DEL");
        let removed: i64 = self.run("DEL", key, |conn| ::redis::cmd("DEL").arg(key).query(conn))?;
        Ok(removed > 0)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        trace!(key, "EXISTS");
        self.run("EXISTS", key, |conn| {
            ::redis::cmd("EXISTS").arg(key).query(conn)
        })
    }

    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        trace!(pattern, scan = ?self.key_scan, "KEYS");
        match self.key_scan {
            KeyScan::Keys => {
                let raw: Vec<Vec<u8>> = self.run("KEYS", pattern, |conn| {
                    ::redis::cmd("KEYS").arg(pattern).query(conn)
                })?;
                Ok(utf8_keys(raw))
            }
            KeyScan::Cursor { count } => self.scan(pattern, count.max(1)),
        }
    }
}

/// Keep the keys that are valid UTF-8.
///
/// Redis keys are binary; a key that is not UTF-8 has no filename and is left
/// out of every listing rather than failing the whole scan.
fn utf8_keys(raw: Vec<Vec<u8>>) -> Vec<String> {
    raw.into_iter()
        .filter_map(|key| match String::from_utf8(key) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!(key = ?String::from_utf8_lossy(e.as_bytes()), "skipping non-UTF-8 key");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_utf8_keys_are_skipped() {
        let raw = vec![b"a:b".to_vec(), vec![0xff, b':', b'x'], b"c".to_vec()];
        assert_eq!(utf8_keys(raw), vec!["a:b".to_string(), "c".to_string()]);
    }
}
