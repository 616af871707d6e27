//! Memoize Module
//!
//! Argument normalization, key derivation, and the memoizing wrapper built on them.

pub mod key;
mod memoizer;
mod signature;
mod stats;


// Re-export public types
pub use key::{derive_key, KEY_PREFIX};
pub use memoizer::{Decorator, MemoizeOptions, Memoized, Memoizer, DEFAULT_TTL};
pub use signature::{normalize, ArgumentMap, CallArgs, Parameter, Signature};
pub use stats::CacheStats;
