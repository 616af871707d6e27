//! Redis Storage Module
//!
//! Network backend over a shared Redis server, for results visible across processes.
//! Expiry is enforced by Redis itself, so expired keys are already absent from GET, DEL
//! and SCAN.

use std::fmt;
use std::time::Duration;

use redis::{Client, Connection};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::RedisConfig;
use crate::error::{CacheError, Result};
use crate::storage::StorageBackend;

/// Keys requested per SCAN round trip
const SCAN_BATCH: usize = 500;

/// Longest TTL sent as PX; anything longer is stored without expiry
const MAX_PX_MILLIS: u128 = (i64::MAX / 2) as u128;

// == Redis Backend ==
/// Each operation takes a fresh connection from the client, so a server restart or an
/// idle disconnect only fails the calls made while the server is down.
pub struct RedisBackend {
    client: Client,
    address: String,
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    // == Constructor ==
    /// Connects to Redis and verifies the server answers PING.
    ///
    /// Fails with `BackendUnavailable` if the server cannot be reached.
    pub fn connect(config: &RedisConfig) -> Result<Self> {
        let url = connection_url(config)?;
        let address = format!("{}:{}/{}", config.host, config.port, config.db);

        let client = Client::open(url.as_str())
            .map_err(|e| CacheError::InvalidConfig(format!("redis client for {}: {}", address, e)))?;
        Self::from_client(client, address)
    }

    /// Connects using a `redis://` URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|e| CacheError::InvalidConfig(format!("redis url: {}", e)))?;
        let address = format!(
            "{}:{}{}",
            parsed.host_str().unwrap_or("localhost"),
            parsed.port().unwrap_or(6379),
            parsed.path()
        );

        let client = Client::open(url)
            .map_err(|e| CacheError::InvalidConfig(format!("redis url: {}", e)))?;
        Self::from_client(client, address)
    }

    fn from_client(client: Client, address: String) -> Result<Self> {
        let unavailable = |e: redis::RedisError| {
            CacheError::BackendUnavailable(format!("redis at {}: {}", address, e))
        };

        let mut conn = client.get_connection().map_err(unavailable)?;
        redis::cmd("PING")
            .query::<String>(&mut conn)
            .map_err(unavailable)?;

        info!("Connected to redis at {}", address);
        Ok(Self { client, address })
    }

    /// Server address this backend talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    fn conn(&self) -> Result<Connection> {
        Ok(self.client.get_connection()?)
    }
}

impl StorageBackend for RedisBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = redis::cmd("GET")
            .arg(key)
            .query::<Option<Vec<u8>>>(&mut self.conn()?)?;
        Ok(value)
    }

    fn set(&self, key: &str, value: Vec<u8>, expiration: Option<Duration>) -> Result<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value.as_slice());
        if let Some(millis) = expiration.and_then(px_millis) {
            cmd.arg("PX").arg(millis);
        }
        cmd.query::<()>(&mut self.conn()?)?;
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<u64> {
        let deleted = redis::cmd("DEL").arg(key).query::<u64>(&mut self.conn()?)?;
        Ok(deleted)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = glob_prefix_pattern(prefix);
        let mut conn = self.conn()?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query(&mut conn)?;

            keys.extend(decode_keys(batch, prefix));
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across iterations
        keys.sort();
        keys.dedup();
        debug!("SCAN {} matched {} keys", pattern, keys.len());
        Ok(keys)
    }
}

// == Helpers ==
fn connection_url(config: &RedisConfig) -> Result<Url> {
    let invalid = |what: &str| CacheError::InvalidConfig(format!("invalid redis {}", what));

    let mut url = Url::parse("redis://localhost").map_err(|_| invalid("url"))?;
    url.set_host(Some(&config.host))
        .map_err(|e| CacheError::InvalidConfig(format!("invalid redis host '{}': {}", config.host, e)))?;
    url.set_port(Some(config.port)).map_err(|_| invalid("port"))?;
    if let Some(username) = &config.username {
        url.set_username(username).map_err(|_| invalid("username"))?;
    }
    if let Some(password) = &config.password {
        url.set_password(Some(password))
            .map_err(|_| invalid("password"))?;
    }
    url.set_path(&format!("/{}", config.db));
    Ok(url)
}

/// Converts a TTL to PX milliseconds, rounding sub-millisecond TTLs up to 1 ms.
///
/// Zero and unrepresentably long TTLs mean "never expires".
fn px_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    let millis = ttl.as_millis().max(1);
    if millis > MAX_PX_MILLIS {
        return None;
    }
    u64::try_from(millis).ok()
}

/// Keeps the UTF-8 keys of a SCAN batch that literally start with `prefix`.
///
/// Binary keys cannot be memoization keys, so they are skipped rather than failing the scan.
fn decode_keys(batch: Vec<Vec<u8>>, prefix: &str) -> impl Iterator<Item = String> + '_ {
    batch.into_iter().filter_map(move |raw| match String::from_utf8(raw) {
        Ok(key) => key.starts_with(prefix).then_some(key),
        Err(e) => {
            warn!("Skipping non UTF-8 redis key {:?}", e.as_bytes());
            None
        }
    })
}

/// SCAN pattern matching keys that literally start with `prefix`.
fn glob_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}
