//! PayloadRegistry: the allow/deny list of decodable payload types.
//!
//! Decoding a handler instantiates whatever type its tag names. The registry
//! keeps that set closed: only registered tags can be decoded, and a
//! registered tag can still be denied (e.g. to retire a payload type without
//! removing its code).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::payload::{Payload, PayloadType};
use crate::domain::DeserializationError;

/// Decoder for one payload type: JSON body -> erased payload.
pub(crate) type DecodeFn = fn(&str) -> Result<Arc<dyn Payload>, serde_json::Error>;

fn decode_as<P: PayloadType>(body: &str) -> Result<Arc<dyn Payload>, serde_json::Error> {
    let payload: P = serde_json::from_str(body)?;
    Ok(Arc::new(payload))
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("payload type '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// # Example
/// ```ignore
/// let mut registry = PayloadRegistry::new();
/// registry.register::<SendWelcome>()?;
/// registry.deny("acme.legacy.export.v1");
/// let codec = PayloadCodec::new(registry);
/// ```
#[derive(Default)]
pub struct PayloadRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
    denied: HashSet<String>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: PayloadType>(&mut self) -> Result<(), RegistryError> {
        if self.decoders.contains_key(P::TYPE) {
            return Err(RegistryError::AlreadyRegistered(P::TYPE.to_string()));
        }
        self.decoders.insert(P::TYPE, decode_as::<P>);
        Ok(())
    }

    /// Refuse to decode `tag` even if it is registered.
    pub fn deny(&mut self, tag: impl Into<String>) {
        self.denied.insert(tag.into());
    }

    /// Lift a previous `deny`.
    pub fn allow(&mut self, tag: &str) {
        self.denied.remove(tag);
    }

    /// Decoder for `tag`, if it is both registered and not denied.
    pub(crate) fn resolve(&self, tag: &str) -> Result<DecodeFn, DeserializationError> {
        if self.denied.contains(tag) {
            return Err(DeserializationError::Denied {
                tag: tag.to_string(),
            });
        }
        self.decoders
            .get(tag)
            .copied()
            .ok_or_else(|| DeserializationError::UnknownType {
                tag: tag.to_string(),
            })
    }

    pub fn is_decodable(&self, tag: &str) -> bool {
        self.resolve(tag).is_ok()
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.decoders.keys().map(|t| t.to_string()).collect();
        types.sort();
        types
    }
}
