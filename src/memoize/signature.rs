//! Signature Module
//!
//! Declared parameter lists and the normalization of a concrete call against them.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Parameter ==
/// One declared parameter: its name and optional default value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Value>,
}

// == Signature ==
/// Statically declared shape of a memoized function.
///
/// Parameters with defaults are expected to follow those without.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    name: String,
    params: Vec<Parameter>,
}

impl Signature {
    /// Starts a signature for the function called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter without a default.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Appends a parameter with a default value.
    pub fn param_with_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }
}

// == Call Args ==
/// Positional and keyword arguments of one invocation, in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Appends a keyword argument. A repeated name replaces the earlier value in place.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.keyword.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.keyword.push((name, value)),
        }
        self
    }

    /// All values in call order: positional first, then keyword values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.positional
            .iter()
            .chain(self.keyword.iter().map(|(_, v)| v))
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

// == Argument Map ==
/// Every declared parameter of a call mapped to its effective value, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentMap {
    entries: Vec<(String, Value)>,
    receiver: Option<Value>,
}

impl ArgumentMap {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Deserializes the named argument into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first positional argument dropped by `skip_first`, if any.
    ///
    /// It is handed to the wrapped function but never reaches the cache key.
    pub fn receiver(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }
}

// == Normalize ==
/// Aligns a call's arguments with the declared signature.
///
/// Defaults are filled first (`Value::Null` for parameters without one), positional
/// arguments overlay by position, then keyword arguments overlay by name. With
/// `skip_first`, the first declared parameter and the first positional argument are
/// dropped before alignment.
pub fn normalize(
    signature: &Signature,
    positional: &[Value],
    keyword: &[(String, Value)],
    skip_first: bool,
) -> Result<ArgumentMap> {
    let (params, positional, receiver) = if skip_first {
        (
            signature.params.get(1..).unwrap_or_default(),
            positional.get(1..).unwrap_or_default(),
            positional.first().cloned(),
        )
    } else {
        (signature.params.as_slice(), positional, None)
    };

    if positional.len() > params.len() {
        return Err(CacheError::Arity(format!(
            "{}() takes {} positional arguments but {} were given",
            signature.name,
            params.len(),
            positional.len()
        )));
    }

    let mut entries: Vec<(String, Value)> = params
        .iter()
        .map(|p| (p.name.clone(), p.default.clone().unwrap_or(Value::Null)))
        .collect();

    for (slot, value) in entries.iter_mut().zip(positional) {
        slot.1 = value.clone();
    }

    for (name, value) in keyword {
        let slot = entries.iter_mut().find(|(n, _)| n == name).ok_or_else(|| {
            CacheError::Arity(format!(
                "{}() got an unexpected keyword argument '{}'",
                signature.name, name
            ))
        })?;
        slot.1 = value.clone();
    }

    Ok(ArgumentMap { entries, receiver })
}
