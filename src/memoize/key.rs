//! Cache Key Module
//!
//! Deterministic key derivation from argument values.
//!
//! A key is `memoize_<function>_<d1>_<d2>_...` where each `dN` is the SHA-256 digest of one
//! argument's canonical JSON form. Digests have a fixed width, so the key built from the
//! first N values is always a literal prefix of the key built from all of them.

use std::fmt::Write;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::memoize::ArgumentMap;

/// Literal token every memoization key starts with
pub const KEY_PREFIX: &str = "memoize_";

/// Hex width of a single argument digest
pub const DIGEST_LEN: usize = 64;

// == Canonical Representation ==
/// Compact JSON with object keys sorted at every level.
pub fn canonical_repr(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, item)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display of a JSON string value is its escaped, quoted form
                let _ = write!(out, "{}", Value::String(name.clone()));
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => {
            let _ = write!(out, "{}", scalar);
        }
    }
}

// == Digest ==
/// Fixed-width hex digest of a value's canonical form.
pub fn digest(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_repr(value).as_bytes());
    format!("{:x}", hasher.finalize())
}

// == Compose ==
/// Joins the key prefix, function name and one digest per value.
pub fn compose_key<'a, I>(function_name: &str, values: I) -> String
where
    I: IntoIterator<Item = &'a Value>,
{
    let digests: Vec<String> = values.into_iter().map(digest).collect();
    format!("{}{}_{}", KEY_PREFIX, function_name, digests.join("_"))
}

// == Derive Key ==
/// Derives the cache key for one normalized call.
///
/// Returns None when `conditions` is non-empty and any `(name, required)` pair does not
/// match the argument map; the call must then bypass the cache. A name absent from the
/// map compares as `null`. With a non-empty `unique_on`, only the named arguments are
/// hashed, unless none of them are present, in which case every argument is.
pub fn derive_key(
    function_name: &str,
    args: &ArgumentMap,
    unique_on: &[String],
    conditions: &[(String, Value)],
) -> Option<String> {
    let gated_out = conditions
        .iter()
        .any(|(name, required)| args.get(name).unwrap_or(&Value::Null) != required);
    if gated_out {
        return None;
    }

    let filtered: Vec<&Value> = args
        .iter()
        .filter(|(name, _)| unique_on.iter().any(|u| u.as_str() == *name))
        .map(|(_, value)| value)
        .collect();

    let key = if filtered.is_empty() {
        compose_key(function_name, args.iter().map(|(_, value)| value))
    } else {
        compose_key(function_name, filtered)
    };
    Some(key)
}

/// Whether `key` was derived for `function_name`.
///
/// Guards prefix scans against functions whose names extend another's, such as
/// `load` and `load_all`.
pub fn is_function_key(key: &str, function_name: &str) -> bool {
    let Some(rest) = key
        .strip_prefix(KEY_PREFIX)
        .and_then(|k| k.strip_prefix(function_name))
        .and_then(|k| k.strip_prefix('_'))
    else {
        return false;
    };

    rest.is_empty()
        || rest.split('_').all(|fragment| {
            fragment.len() == DIGEST_LEN
                && fragment
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
}
