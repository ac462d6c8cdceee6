//! Mapping-key rewriting hooks.
//!
//! A [`KeyTransform`] sits between the raw key text found in (or written to)
//! the document and the logical member name the descriptor uses. Passes
//! without a transform behave as if every hook were the identity.

use crate::graph::{Object, Value};
use crate::types::TypeDescriptor;

/// Override for the text of a string key on write: receives the logical key
/// and the text produced by the key transform.
pub type ScalarKeyEncoder = dyn Fn(&Value, &str) -> String + Send + Sync;

pub trait KeyTransform: Send + Sync {
    /// Raw key text → logical key, before the value is decoded.
    /// `None` leaves the key unchanged.
    fn decode_pre(&self, object: &Object, descriptor: &TypeDescriptor, raw: &str)
        -> Option<String>;

    /// Called once the value for `key` has been decoded. `value` is `None`
    /// when the value is a forward alias still awaiting late binding.
    fn decode_post(
        &self,
        _object: &Object,
        _descriptor: &TypeDescriptor,
        _key: &str,
        _value: Option<&Value>,
    ) {
    }

    /// Logical key → raw key text written to the document.
    fn encode(&self, object: &Object, descriptor: &TypeDescriptor, key: &str) -> String;
}

/// Strips a fixed prefix on decode and adds it back on encode.
///
/// Keys that do not carry the prefix decode unchanged.
#[derive(Debug, Clone)]
pub struct PrefixKeyTransform {
    prefix: String,
}

impl PrefixKeyTransform {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl KeyTransform for PrefixKeyTransform {
    fn decode_pre(
        &self,
        _object: &Object,
        _descriptor: &TypeDescriptor,
        raw: &str,
    ) -> Option<String> {
        raw.strip_prefix(self.prefix.as_str()).map(str::to_string)
    }

    fn encode(&self, _object: &Object, _descriptor: &TypeDescriptor, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}
