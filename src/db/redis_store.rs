//! Remote key-value state store.
//!
//! Data model:
//!   {prefix}:{listing_id}  → JSON listing record (no TTL; removal is explicit)

use crate::db::StateStore;
use crate::errors::StoreError;
use redis::{Client, Commands, Connection};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

// keys per MGET round-trip
const MGET_BATCH: usize = 500;

pub struct RedisStore {
    conn: Connection,
    prefix: String,
}

impl RedisStore {
    pub fn connect(url: &str, prefix: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let mut conn = client.get_connection_with_timeout(timeout)?;
        let pong: String = redis::cmd("PING").query(&mut conn)?;
        if pong != "PONG" {
            return Err(StoreError::Unavailable(format!("unexpected PING reply: {pong}")));
        }
        info!(prefix = prefix, "connected to redis state store");
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, id: &str) -> String {
        listing_key(&self.prefix, id)
    }
}

/// Build a namespaced key: "{prefix}:{id}"
fn listing_key(prefix: &str, id: &str) -> String {
    format!("{prefix}:{id}")
}

fn id_from_key<'k>(prefix: &str, key: &'k str) -> Option<&'k str> {
    key.strip_prefix(prefix)?.strip_prefix(':')
}

/// Values are read as bytes so one non-UTF-8 entry stays a per-record problem.
fn decode_record(key: &str, raw: Vec<u8>) -> Option<String> {
    match String::from_utf8(raw) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(key = key, error = %e, "skipping non-UTF-8 record");
            None
        }
    }
}

impl StateStore for RedisStore {
    fn get_all(&mut self) -> Result<HashMap<String, String>, StoreError> {
        let pattern = format!("{}:*", self.prefix);
        let keys: Vec<String> = self.conn.scan_match(&pattern)?.collect();
        debug!(count = keys.len(), "scanned listing keys");

        let mut out = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(MGET_BATCH) {
            let values: Vec<Option<Vec<u8>>> =
                redis::cmd("MGET").arg(chunk).query(&mut self.conn)?;
            for (key, value) in chunk.iter().zip(values) {
                // deleted between SCAN and MGET, or not a string key
                let Some(raw) = value else { continue };
                let Some(id) = id_from_key(&self.prefix, key) else {
                    continue;
                };
                if let Some(record) = decode_record(key, raw) {
                    out.insert(id.to_string(), record);
                }
            }
        }
        Ok(out)
    }

    fn get(&mut self, id: &str) -> Result<Option<String>, StoreError> {
        let key = self.key(id);
        let raw = match self.conn.get::<_, Option<Vec<u8>>>(&key) {
            Ok(raw) => raw,
            // present, but not a string value: known yet unreadable
            Err(e) if e.code() == Some("WRONGTYPE") => {
                warn!(key = %key, "stored value has the wrong type");
                return Ok(Some(String::new()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(raw.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn put(&mut self, id: &str, record: &str) -> Result<(), StoreError> {
        let key = self.key(id);
        self.conn.set::<_, _, ()>(key, record)?;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let key = self.key(id);
        self.conn.del::<_, ()>(key)?;
        Ok(())
    }
}
