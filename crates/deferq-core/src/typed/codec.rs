//! PayloadCodec: payload <-> handler string.
//!
//! # Handler format
//! ```text
//! !payload:acme.mailer.send_welcome.v1 {"user_id":42}
//! ```
//! A type tag, one space, then the JSON body. The tag makes the handler
//! self-describing: decode resolves it through the registry, and a display
//! name can still be read from it when decoding fails.

use std::sync::Arc;

use super::payload::{Payload, PayloadType};
use super::registry::PayloadRegistry;
use crate::domain::{DeserializationError, EncodeError, JobRecord};

const TAG_PREFIX: &str = "!payload:";

/// Display name of a job whose handler has no readable tag.
pub const UNKNOWN_PAYLOAD: &str = "unknown";

pub struct PayloadCodec {
    registry: PayloadRegistry,
}

impl PayloadCodec {
    pub fn new(registry: PayloadRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PayloadRegistry {
        &self.registry
    }

    pub fn encode<P: PayloadType>(&self, payload: &P) -> Result<String, EncodeError> {
        let body = serde_json::to_string(payload).map_err(|source| EncodeError {
            tag: P::TYPE,
            source,
        })?;
        Ok(format!("{TAG_PREFIX}{} {body}", P::TYPE))
    }

    /// Reconstruct a payload. Unregistered or denied tags are rejected before
    /// any body parsing happens.
    pub fn decode(&self, handler: &str) -> Result<Arc<dyn Payload>, DeserializationError> {
        let (tag, body) = split_handler(handler).ok_or_else(|| DeserializationError::MissingTag {
            handler: handler.to_string(),
        })?;
        let decode = self.registry.resolve(tag)?;
        decode(body).map_err(|e| DeserializationError::Malformed {
            reason: e.to_string(),
            handler: handler.to_string(),
        })
    }

    /// Name used in logs for a job.
    ///
    /// Prefers the payload's own `display_name`, then the type tag. When the
    /// payload cannot be decoded the tag is read straight from the handler.
    pub fn display_name(&self, job: &JobRecord) -> String {
        match job.payload_object(self) {
            Ok(payload) => payload
                .display_name()
                .or_else(|| type_tag(job.handler()).map(str::to_string))
                .unwrap_or_else(|| payload.type_name().to_string()),
            Err(_) => type_tag(job.handler())
                .unwrap_or(UNKNOWN_PAYLOAD)
                .to_string(),
        }
    }
}

/// Name of a payload that has no handler yet.
pub fn display_name_of(payload: &dyn Payload) -> String {
    payload
        .display_name()
        .unwrap_or_else(|| payload.type_name().to_string())
}

/// Type tag token of a handler, without decoding it.
pub fn type_tag(handler: &str) -> Option<&str> {
    let rest = handler.trim_start().strip_prefix(TAG_PREFIX)?;
    let tag = rest.split_whitespace().next()?;
    Some(tag)
}

fn split_handler(handler: &str) -> Option<(&str, &str)> {
    let rest = handler.trim_start().strip_prefix(TAG_PREFIX)?;
    let (tag, body) = match rest.split_once(char::is_whitespace) {
        Some((tag, body)) => (tag, body.trim()),
        None => (rest, ""),
    };
    if tag.is_empty() {
        return None;
    }
    Some((tag, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::testing::{Greeting, Named, test_codec};
    use chrono::Utc;

    #[test]
    fn decode_restores_an_equivalent_payload() {
        let codec = test_codec();
        let original = Greeting::new("ada");

        let handler = codec.encode(&original).unwrap();
        assert!(handler.starts_with("!payload:test.greeting.v1 "));

        let decoded = codec.decode(&handler).unwrap();
        assert_eq!(decoded.display_name().as_deref(), None);
        assert_eq!(codec.encode(&original).unwrap(), handler);
        assert_eq!(display_name_of(decoded.as_ref()), display_name_of(&original));
    }

    #[test]
    fn decoded_payload_keeps_its_fields() {
        let codec = test_codec();
        let handler = codec.encode(&Named::new("weekly digest")).unwrap();

        let decoded = codec.decode(&handler).unwrap();

        assert_eq!(decoded.display_name().as_deref(), Some("weekly digest"));
    }

    #[test]
    fn decode_rejects_unregistered_tag_without_parsing_body() {
        let codec = test_codec();
        let err = codec.decode("!payload:evil.exec.v1 {not json").err().unwrap();
        assert!(matches!(err, DeserializationError::UnknownType { tag } if tag == "evil.exec.v1"));
    }

    #[test]
    fn decode_rejects_missing_tag() {
        let codec = test_codec();
        let err = codec.decode(r#"{"name":"ada"}"#).err().unwrap();
        assert!(matches!(err, DeserializationError::MissingTag { .. }));
    }

    #[test]
    fn decode_rejects_malformed_body() {
        let codec = test_codec();
        let err = codec
            .decode("!payload:test.greeting.v1 {\"nom\":1}")
            .err()
            .unwrap();
        assert!(matches!(err, DeserializationError::Malformed { .. }));
    }

    #[test]
    fn display_name_prefers_payload_capability() {
        let codec = test_codec();
        let handler = codec.encode(&Named::new("nightly report")).unwrap();
        let job = JobRecord::from_handler(handler, 0, None, Utc::now());

        assert_eq!(codec.display_name(&job), "nightly report");
    }

    #[test]
    fn display_name_falls_back_to_type_tag() {
        let codec = test_codec();
        let handler = codec.encode(&Greeting::new("ada")).unwrap();
        let job = JobRecord::from_handler(handler, 0, None, Utc::now());

        assert_eq!(codec.display_name(&job), "test.greeting.v1");
    }

    #[test]
    fn display_name_reads_tag_when_decode_fails() {
        let codec = test_codec();
        let job = JobRecord::from_handler("!payload:gone.away.v3 {}", 0, None, Utc::now());

        assert_eq!(codec.display_name(&job), "gone.away.v3");
    }

    #[test]
    fn display_name_of_untagged_garbage_is_unknown() {
        let codec = test_codec();
        let job = JobRecord::from_handler("garbage", 0, None, Utc::now());

        assert_eq!(codec.display_name(&job), UNKNOWN_PAYLOAD);
    }

    #[test]
    fn type_tag_is_read_from_handler() {
        assert_eq!(type_tag("!payload:a.b.v1 {}"), Some("a.b.v1"));
        assert_eq!(type_tag("!payload:a.b.v1"), Some("a.b.v1"));
        assert_eq!(type_tag("a.b.v1 {}"), None);
    }
}
