//! Descriptors and artifact manifests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Digest, EMPTY_JSON, EMPTY_MEDIA_TYPE, MANIFEST_MEDIA_TYPE};
use crate::error::{RegistryError, Result};

/// Content-addressed reference to a blob or manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    pub media_type: String,
    /// Digest of the referenced bytes.
    pub digest: Digest,
    /// Size of the referenced bytes.
    pub size: u64,
    /// Optional descriptor annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    /// Describe in-memory bytes.
    pub fn for_bytes(media_type: impl Into<String>, data: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            digest: Digest::of(data),
            size: data.len() as u64,
            annotations: BTreeMap::new(),
        }
    }

    /// The descriptor of the empty `{}` config blob.
    pub fn empty_config() -> Self {
        Self::for_bytes(EMPTY_MEDIA_TYPE, EMPTY_JSON)
    }

    /// Add an annotation.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// An OCI image manifest carrying an artifact.
///
/// Annotations live in a `BTreeMap` so that serialization is ordered and
/// the same content always produces the same manifest digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Always 2.
    pub schema_version: u32,
    /// Media type of the manifest itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Type of artifact this manifest describes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    /// Config blob descriptor.
    pub config: Descriptor,
    /// Content layers, in order.
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    /// Manifest annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Manifest {
    /// Create an artifact manifest with the empty config blob.
    pub fn artifact(
        artifact_type: impl Into<String>,
        layers: Vec<Descriptor>,
        annotations: BTreeMap<String, String>,
    ) -> Self {
        Self {
            schema_version: 2,
            media_type: Some(MANIFEST_MEDIA_TYPE.to_string()),
            artifact_type: Some(artifact_type.into()),
            config: Descriptor::empty_config(),
            layers,
            annotations,
        }
    }

    /// Serialize to the canonical bytes that get pushed and digested.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RegistryError::pack(format!("encode manifest: {}", e)))
    }

    /// Parse manifest bytes received from a store.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(data)
            .map_err(|e| RegistryError::protocol(format!("malformed manifest: {}", e)))?;

        if manifest.schema_version != 2 {
            return Err(RegistryError::protocol(format!(
                "unsupported manifest schema version {}",
                manifest.schema_version
            )));
        }

        Ok(manifest)
    }

    /// Look up a manifest annotation.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Every blob this manifest references, config first.
    pub fn blobs(&self) -> impl Iterator<Item = &Descriptor> {
        std::iter::once(&self.config).chain(self.layers.iter())
    }
}
