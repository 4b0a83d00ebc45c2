//! Payload serialization port and codec registry
//!
//! Each resource type carried through the queues has a codec that turns its
//! [`SyncPayload`] into the byte stream stored in the blob store and back.
//! Codecs are registered once at startup in a [`PayloadCodecRegistry`];
//! resolving a type the registry does not know fails with
//! [`SyncError::UnknownResourceType`] before any storage work happens, and
//! the supported types are enumerable for diagnostics.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{SyncError, SyncPayload};

/// Port trait for serializing payloads of one or more resource types
pub trait PayloadCodec: std::fmt::Debug + Send + Sync {
    /// MIME type of the encoded representation
    fn content_type(&self) -> &'static str;

    /// Encodes a payload body into bytes
    fn encode(&self, payload: &SyncPayload) -> Result<Vec<u8>, SyncError>;

    /// Decodes bytes back into a payload of the given resource type
    fn decode(&self, resource_type: &str, data: &[u8]) -> Result<SyncPayload, SyncError>;
}

/// JSON codec, the default for every registered resource type
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPayloadCodec;

impl PayloadCodec for JsonPayloadCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, payload: &SyncPayload) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(payload.body()).map_err(|e| SyncError::Codec {
            resource_type: payload.resource_type().to_string(),
            message: e.to_string(),
        })
    }

    fn decode(&self, resource_type: &str, data: &[u8]) -> Result<SyncPayload, SyncError> {
        let body = serde_json::from_slice(data).map_err(|e| SyncError::Codec {
            resource_type: resource_type.to_string(),
            message: e.to_string(),
        })?;
        Ok(SyncPayload::new(resource_type, body))
    }
}

/// Startup-time registry mapping resource types to codecs
///
/// Built once when the process starts and shared (via `Arc`) with every
/// queue instance. The set of supported types is fixed after construction.
#[derive(Default)]
pub struct PayloadCodecRegistry {
    codecs: HashMap<String, Arc<dyn PayloadCodec>>,
}

impl PayloadCodecRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a codec for a resource type, replacing any previous one
    pub fn register(&mut self, resource_type: impl Into<String>, codec: Arc<dyn PayloadCodec>) {
        self.codecs.insert(resource_type.into(), codec);
    }

    /// Registers the JSON codec for each of the given resource types
    #[must_use]
    pub fn with_json_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codec: Arc<dyn PayloadCodec> = Arc::new(JsonPayloadCodec);
        let mut registry = Self::new();
        for t in types {
            registry.register(t, Arc::clone(&codec));
        }
        registry
    }

    /// Resolves the codec for a resource type
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownResourceType`] if no codec is registered.
    pub fn resolve(&self, resource_type: &str) -> Result<&Arc<dyn PayloadCodec>, SyncError> {
        self.codecs
            .get(resource_type)
            .ok_or_else(|| SyncError::UnknownResourceType {
                resource_type: resource_type.to_string(),
            })
    }

    /// Returns the registered resource types, sorted for stable output
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Returns true if a codec is registered for the resource type
    pub fn supports(&self, resource_type: &str) -> bool {
        self.codecs.contains_key(resource_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec_round_trip() {
        let codec = JsonPayloadCodec;
        let payload = SyncPayload::new("Patient", json!({"name": "Dupont", "active": true}));

        let bytes = codec.encode(&payload).unwrap();
        let decoded = codec.decode("Patient", &bytes).unwrap();

        assert_eq!(decoded.resource_type(), "Patient");
        assert_eq!(decoded.body(), payload.body());
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let codec = JsonPayloadCodec;
        let err = codec.decode("Patient", b"{not json").unwrap_err();
        assert!(matches!(err, SyncError::Codec { .. }));
    }

    #[test]
    fn test_registry_resolution() {
        let registry = PayloadCodecRegistry::with_json_types(["Patient", "Observation"]);

        assert!(registry.supports("Patient"));
        assert!(registry.resolve("Patient").is_ok());

        let err = registry.resolve("Encounter").unwrap_err();
        assert!(matches!(err, SyncError::UnknownResourceType { .. }));
    }

    #[test]
    fn test_registry_enumerates_types() {
        let registry = PayloadCodecRegistry::with_json_types(["Observation", "Patient"]);
        assert_eq!(registry.resource_types(), vec!["Observation", "Patient"]);
    }
}
