//! The wire representation of a queued mail
//!
//! What travels through the broker is never the mail itself: it is a small
//! reference carrying routing metadata and the content-derived identifiers
//! of the stored header and body blocks.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use missive_blob::BlobPartsId;
use missive_common::{EnqueueId, Mail};

/// Reference to a queued mail: routing metadata plus blob pointers
///
/// Invariant: never contains raw message bytes, only the identifiers needed
/// to resolve them against the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailReference {
    pub enqueue_id: EnqueueId,
    pub name: String,
    pub sender: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub attributes: AHashMap<String, String>,
    pub parts: BlobPartsId,
}

impl MailReference {
    /// Build a reference for one enqueue attempt of a mail
    #[must_use]
    pub fn from_mail(enqueue_id: EnqueueId, mail: &Mail, parts: BlobPartsId) -> Self {
        Self {
            enqueue_id,
            name: mail.name().to_string(),
            sender: mail.sender().to_string(),
            recipients: mail.recipients().to_vec(),
            state: mail.state().to_string(),
            attributes: mail.attributes().clone(),
            parts,
        }
    }
}

/// Errors from encoding or decoding mail references.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The reference could not be serialized for publishing.
    #[error("Unable to serialize mail reference: {0}")]
    Encode(#[source] serde_json::Error),

    /// The payload is structurally malformed. Non-retriable: the bytes will
    /// be just as malformed on every redelivery.
    #[error("Malformed mail reference payload: {0}")]
    Decode(#[source] serde_json::Error),
}

impl CodecError {
    /// Returns `true` for decode failures (the poison direction).
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Serializes mail references to and from broker payload bytes
///
/// The format is JSON and deliberately forward-compatible: unknown fields in
/// a decoded payload are ignored, and optional fields default, since broker
/// messages may be produced by a different software version than the one
/// consuming them.
#[derive(Debug, Clone, Copy, Default)]
pub struct MailReferenceCodec;

impl MailReferenceCodec {
    pub fn encode(reference: &MailReference) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(reference).map_err(CodecError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<MailReference, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use missive_blob::BlobId;

    use super::*;

    fn reference() -> MailReference {
        let mail = Mail::builder()
            .name("mail-1")
            .sender("a@x")
            .recipient("b@y")
            .recipient("c@z")
            .attribute("spam-score", "0.3")
            .build();

        MailReference::from_mail(
            EnqueueId::generate(),
            &mail,
            BlobPartsId {
                header: BlobId::of(b"header"),
                body: BlobId::of(b"body"),
            },
        )
    }

    #[test]
    fn test_round_trip() {
        let original = reference();
        let bytes = MailReferenceCodec::encode(&original).expect("encode");
        let decoded = MailReferenceCodec::decode(&bytes).expect("decode");
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let original = reference();
        let mut value: serde_json::Value =
            serde_json::from_slice(&MailReferenceCodec::encode(&original).expect("encode"))
                .expect("valid json");

        // A newer producer may add fields this version knows nothing about
        value["priority"] = serde_json::json!(7);
        value["delivery_window"] = serde_json::json!({ "from": "2026-01-01" });

        let bytes = serde_json::to_vec(&value).expect("serialize");
        let decoded = MailReferenceCodec::decode(&bytes).expect("decode");
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let original = reference();
        let mut value: serde_json::Value =
            serde_json::from_slice(&MailReferenceCodec::encode(&original).expect("encode"))
                .expect("valid json");

        value.as_object_mut().expect("object").remove("recipients");
        value.as_object_mut().expect("object").remove("attributes");
        value.as_object_mut().expect("object").remove("state");

        let bytes = serde_json::to_vec(&value).expect("serialize");
        let decoded = MailReferenceCodec::decode(&bytes).expect("decode");
        assert!(decoded.recipients.is_empty());
        assert!(decoded.attributes.is_empty());
        assert!(decoded.state.is_empty());
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        let result = MailReferenceCodec::decode(b"\x00\x01 definitely not json");
        let err = result.expect_err("malformed payload must fail");
        assert!(err.is_decode());
    }

    #[test]
    fn test_reference_carries_no_raw_bytes() {
        let mail = Mail::builder()
            .sender("a@x")
            .recipient("b@y")
            .header(&b"X-Marker: header-content-7f3a\r\n"[..])
            .body(&b"body-content-9c1d"[..])
            .build();
        let parts = BlobPartsId {
            header: BlobId::of(mail.header()),
            body: BlobId::of(mail.body()),
        };
        let reference = MailReference::from_mail(EnqueueId::generate(), &mail, parts);

        let bytes = MailReferenceCodec::encode(&reference).expect("encode");
        let text = String::from_utf8(bytes).expect("json is utf8");

        // Only the content digests appear, never the content
        assert!(text.contains(reference.parts.body.as_hex()));
        assert!(!text.contains("header-content-7f3a"));
        assert!(!text.contains("body-content-9c1d"));
    }
}
