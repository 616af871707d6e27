//! Memoizer Module
//!
//! Wraps functions so their results are served from a storage backend, and invalidates
//! stored results by function name and leading argument values.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::memoize::key::{compose_key, derive_key, is_function_key};
use crate::memoize::{normalize, ArgumentMap, CacheStats, CallArgs, Signature};
use crate::storage::{open_backend, StorageBackend};

/// TTL applied when none is configured
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

// == Memoize Options ==
/// Per-function memoization settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoizeOptions {
    /// Lifetime of stored results, None or zero = never expires
    pub ttl: Option<Duration>,
    /// Argument names the key is built from, empty = all
    pub unique_on: Vec<String>,
    /// `(name, value)` pairs that must all hold for a call to be cached
    pub conditions: Vec<(String, Value)>,
    /// Drop the first declared parameter and first positional argument (the receiver)
    pub skip_first: bool,
}

impl Default for MemoizeOptions {
    fn default() -> Self {
        Self {
            ttl: Some(DEFAULT_TTL),
            unique_on: Vec::new(),
            conditions: Vec::new(),
            skip_first: false,
        }
    }
}

impl MemoizeOptions {
    /// Defaults with the TTL taken from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl: Some(Duration::from_secs(config.default_ttl)),
            ..Self::default()
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Stored results never expire.
    pub fn no_expiry(mut self) -> Self {
        self.ttl = None;
        self
    }

    pub fn unique_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_on = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn condition(mut self, name: impl Into<String>, required: impl Into<Value>) -> Self {
        self.conditions.push((name.into(), required.into()));
        self
    }

    pub fn skip_first(mut self, skip: bool) -> Self {
        self.skip_first = skip;
        self
    }
}

// == Memoizer ==
/// Entry point: owns the storage backend shared by every function it wraps.
#[derive(Debug, Clone)]
pub struct Memoizer {
    storage: Arc<dyn StorageBackend>,
    stats: Arc<Mutex<CacheStats>>,
}

impl Memoizer {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            stats: Arc::new(Mutex::new(CacheStats::new())),
        }
    }

    /// Opens the configured backend. Fails immediately if the network store is unreachable.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(open_backend(config)?))
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Snapshot of the counters shared by all functions wrapped by this memoizer.
    pub fn stats(&self) -> CacheStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut *stats);
    }

    /// Returns a decorator applying `options` to the function it wraps.
    ///
    /// Wrap each function once; wrapping an already memoized function caches the outer
    /// wrapper, not the function.
    pub fn memoize(&self, options: MemoizeOptions) -> Decorator {
        Decorator {
            memoizer: self.clone(),
            options,
        }
    }

    // == Invalidate ==
    /// Deletes stored results of `function_name` whose leading arguments equal `args`.
    ///
    /// Values are matched strictly left to right: positional values first, then keyword
    /// values in the order given. Keyword names are not consulted, so a call that skips a
    /// leading argument matches nothing. Returns the number of entries deleted.
    pub fn invalidate(&self, function_name: &str, args: &CallArgs) -> Result<usize> {
        let prefix = compose_key(function_name, args.values());
        let keys = self.storage.keys_with_prefix(&prefix)?;

        let mut deleted = 0;
        for key in keys.iter().filter(|key| is_function_key(key, function_name)) {
            deleted += self.storage.delete(key)? as usize;
        }

        info!("Invalidated {} memoized entries for {}", deleted, function_name);
        self.record(|stats| stats.record_invalidated(deleted));
        Ok(deleted)
    }
}

// == Decorator ==
/// Memoization settings waiting for the function they apply to.
#[derive(Debug, Clone)]
pub struct Decorator {
    memoizer: Memoizer,
    options: MemoizeOptions,
}

impl Decorator {
    pub fn wrap<F, R>(self, signature: Signature, function: F) -> Memoized<F, R>
    where
        F: Fn(&ArgumentMap) -> R,
        R: Serialize + DeserializeOwned + PartialEq,
    {
        Memoized {
            memoizer: self.memoizer,
            options: self.options,
            signature,
            function,
            _result: PhantomData,
        }
    }
}

// == Memoized ==
/// A function whose results are cached in the memoizer's backend.
pub struct Memoized<F, R> {
    memoizer: Memoizer,
    options: MemoizeOptions,
    signature: Signature,
    function: F,
    _result: PhantomData<fn() -> R>,
}

impl<F, R> Memoized<F, R>
where
    F: Fn(&ArgumentMap) -> R,
    R: Serialize + DeserializeOwned + PartialEq,
{
    pub fn name(&self) -> &str {
        self.signature.name()
    }

    pub fn options(&self) -> &MemoizeOptions {
        &self.options
    }

    /// Calls the function, or returns its stored result for equivalent arguments.
    ///
    /// Arity errors and backend failures are returned. A result that cannot be stored
    /// faithfully is logged and still returned; it is recomputed next time.
    pub fn call(&self, args: &CallArgs) -> Result<R> {
        let all_args = normalize(
            &self.signature,
            &args.positional,
            &args.keyword,
            self.options.skip_first,
        )?;

        let Some(key) = derive_key(
            self.signature.name(),
            &all_args,
            &self.options.unique_on,
            &self.options.conditions,
        ) else {
            debug!("Memoize bypassed for {}: conditions unmet", self.name());
            self.memoizer.record(CacheStats::record_bypass);
            return Ok((self.function)(&all_args));
        };

        let storage = &self.memoizer.storage;
        if let Some(stored) = storage.get(&key)? {
            match serde_json::from_slice::<R>(&stored) {
                Ok(value) => {
                    debug!("Memoize hit for {}", key);
                    self.memoizer.record(CacheStats::record_hit);
                    return Ok(value);
                }
                Err(err) => {
                    warn!("Discarding unreadable memoized value for {}: {}", key, err);
                }
            }
        }

        debug!("Memoize miss for {}", key);
        self.memoizer.record(CacheStats::record_miss);
        let value = (self.function)(&all_args);

        match encode_result(&value) {
            Ok(bytes) => {
                if !storage.set(&key, bytes, self.options.ttl)? {
                    warn!("Backend declined to store memoized value for {}", key);
                    self.memoizer.record(CacheStats::record_store_failure);
                }
            }
            Err(reason) => {
                warn!("Could not cache function call for {}: {}", key, reason);
                self.memoizer.record(CacheStats::record_store_failure);
            }
        }

        Ok(value)
    }

    /// Invalidates this function's entries matching `args`; see [`Memoizer::invalidate`].
    pub fn invalidate(&self, args: &CallArgs) -> Result<usize> {
        self.memoizer.invalidate(self.signature.name(), args)
    }
}

/// Serializes a result, refusing encodings that would read back as a different value.
///
/// JSON has no NaN or infinity and serde_json writes them as `null`, so `Some(f64::NAN)`
/// would otherwise come back as `None`.
fn encode_result<R>(value: &R) -> std::result::Result<Vec<u8>, String>
where
    R: Serialize + DeserializeOwned + PartialEq,
{
    let bytes = serde_json::to_vec(value).map_err(|e| format!("result not serializable: {}", e))?;
    match serde_json::from_slice::<R>(&bytes) {
        Ok(decoded) if decoded == *value => Ok(bytes),
        Ok(_) => Err("result changes when read back from JSON".to_string()),
        Err(e) => Err(format!("result cannot be read back: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::storage::MemoryBackend;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memoizer() -> Memoizer {
        Memoizer::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn test_options_default() {
        let options = MemoizeOptions::default();
        assert_eq!(options.ttl, Some(Duration::from_secs(300)));
        assert!(options.unique_on.is_empty());
        assert!(options.conditions.is_empty());
        assert!(!options.skip_first);
    }

    #[test]
    fn test_options_from_config() {
        let config = Config {
            default_ttl: 42,
            ..Config::default()
        };
        assert_eq!(
            MemoizeOptions::from_config(&config).ttl,
            Some(Duration::from_secs(42))
        );
    }

    #[test]
    fn test_memoize_caches_result() {
        let mm = memoizer();
        let calls = AtomicUsize::new(0);
        let f = mm
            .memoize(MemoizeOptions::default())
            .wrap(Signature::new("test_function1"), |_: &ArgumentMap| {
                calls.fetch_add(1, Ordering::SeqCst);
                "testing".to_string()
            });

        assert_eq!(f.call(&CallArgs::new()).unwrap(), "testing");
        assert_eq!(f.call(&CallArgs::new()).unwrap(), "testing");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = mm.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_arity_error_propagates() {
        let mm = memoizer();
        let f = mm
            .memoize(MemoizeOptions::default())
            .wrap(Signature::new("one").param("x"), |args: &ArgumentMap| {
                args.get_as::<i64>("x")
            });

        let result = f.call(&CallArgs::new().arg(1).arg(2));
        assert!(matches!(result, Err(CacheError::Arity(_))));

        let result = f.call(&CallArgs::new().kwarg("y", 1));
        assert!(matches!(result, Err(CacheError::Arity(_))));
    }

    #[test]
    fn test_unreadable_entry_is_recomputed() {
        let mm = memoizer();
        let f = mm
            .memoize(MemoizeOptions::default())
            .wrap(Signature::new("count").param("x"), |args: &ArgumentMap| {
                args.get_as::<u32>("x").unwrap_or_default()
            });

        let key = compose_key("count", [&json!(4)]);
        mm.storage().set(&key, b"\"not a number\"".to_vec(), None).unwrap();

        assert_eq!(f.call(&CallArgs::new().arg(4)).unwrap(), 4);
        assert_eq!(mm.storage().get(&key).unwrap(), Some(b"4".to_vec()));
    }

    #[test]
    fn test_encode_result_rejects_lossy_floats() {
        assert!(encode_result(&Some(f64::NAN)).is_err());
        assert!(encode_result(&vec![1.0, f64::INFINITY]).is_err());
        assert!(encode_result(&f64::NEG_INFINITY).is_err());

        assert_eq!(encode_result(&Some(0.1_f64)).unwrap(), b"0.1".to_vec());
        assert_eq!(encode_result(&None::<f64>).unwrap(), b"null".to_vec());
    }

    #[test]
    fn test_bound_method_ignores_receiver() {
        let mm = memoizer();
        let calls = AtomicUsize::new(0);
        let f = mm.memoize(MemoizeOptions::default().skip_first(true)).wrap(
            Signature::new("area").param("self").param("scale"),
            |args: &ArgumentMap| {
                calls.fetch_add(1, Ordering::SeqCst);
                let receiver = args.receiver().and_then(Value::as_i64).unwrap_or(0);
                receiver * args.get_as::<i64>("scale").unwrap_or(1)
            },
        );

        assert_eq!(f.call(&CallArgs::new().arg(3).arg(2)).unwrap(), 6);
        // Different receiver, same key: served from the cache
        assert_eq!(f.call(&CallArgs::new().arg(5).arg(2)).unwrap(), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_with_no_matches() {
        let mm = memoizer();
        assert_eq!(mm.invalidate("never_called", &CallArgs::new()).unwrap(), 0);
    }

    #[test]
    fn test_invalidate_leaves_similarly_named_function() {
        let mm = memoizer();
        let load = mm
            .memoize(MemoizeOptions::default())
            .wrap(Signature::new("load").param("id"), |args: &ArgumentMap| {
                args.get_as::<i64>("id")
            });
        let load_all = mm
            .memoize(MemoizeOptions::default())
            .wrap(Signature::new("load_all").param("id"), |args: &ArgumentMap| {
                args.get_as::<i64>("id")
            });

        load.call(&CallArgs::new().arg(1)).unwrap();
        load_all.call(&CallArgs::new().arg(1)).unwrap();

        assert_eq!(load.invalidate(&CallArgs::new()).unwrap(), 1);
        assert_eq!(mm.storage().keys_with_prefix("memoize_load_all_").unwrap().len(), 1);
        assert_eq!(mm.stats().invalidated, 1);
    }
}
