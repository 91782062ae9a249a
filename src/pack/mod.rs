//! Manifest packing.
//!
//! The [`ManifestPacker`] turns staged files into layer descriptors and wraps
//! them in an artifact manifest. It never talks to a store: the result is a
//! [`PackedArtifact`] that lists every blob to push and the manifest bytes to
//! tag afterwards.
//!
//! Packing is deterministic. No timestamp is added, and layer titles are
//! supplied by the caller instead of being taken from the staging file name,
//! so identical archive bytes and annotations give identical manifest
//! digests.
//!
//! # Example
//!
//! ```
//! use modreg::pack::ManifestPacker;
//! use modreg::oci::{MODULE_ARTIFACT_TYPE, MODULE_LAYER_MEDIA_TYPE};
//! use std::collections::BTreeMap;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("module.tgz");
//! std::fs::write(&path, b"archive").unwrap();
//!
//! let mut packer = ManifestPacker::new(MODULE_ARTIFACT_TYPE);
//! packer.add_file(&path, "module.tgz", MODULE_LAYER_MEDIA_TYPE).unwrap();
//! let packed = packer.pack(BTreeMap::new()).unwrap();
//!
//! assert_eq!(packed.manifest.layers.len(), 1);
//! assert_eq!(packed.blobs.len(), 2);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};
use crate::oci::{
    Descriptor, Digest, Manifest, ANNOTATION_TITLE, EMPTY_JSON, MANIFEST_MEDIA_TYPE,
};

/// Where the bytes of a packed blob come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobSource {
    /// Bytes held in memory.
    Inline(Vec<u8>),
    /// Bytes in a local file.
    File(PathBuf),
}

/// A blob referenced by a packed manifest.
#[derive(Debug, Clone)]
pub struct PackedBlob {
    pub descriptor: Descriptor,
    pub source: BlobSource,
}

impl PackedBlob {
    /// Read the blob bytes and check them against the descriptor.
    pub fn read(&self) -> Result<Vec<u8>> {
        let data = match &self.source {
            BlobSource::Inline(data) => data.clone(),
            BlobSource::File(path) => std::fs::read(path).map_err(|e| {
                RegistryError::staging(format!("cannot read {}: {}", path.display(), e))
            })?,
        };

        if !self.descriptor.digest.verify(&data) {
            return Err(RegistryError::staging(format!(
                "staged blob changed after packing (expected {})",
                self.descriptor.digest
            )));
        }

        Ok(data)
    }
}

/// A manifest ready to be copied into a repository.
#[derive(Debug, Clone)]
pub struct PackedArtifact {
    pub manifest: Manifest,
    /// Exact bytes to push; the descriptor digest is computed over these.
    pub manifest_bytes: Vec<u8>,
    pub descriptor: Descriptor,
    /// Every blob the manifest references, config first.
    pub blobs: Vec<PackedBlob>,
}

/// Builds artifact manifests from local files.
#[derive(Debug, Clone)]
pub struct ManifestPacker {
    artifact_type: String,
    layers: Vec<PackedBlob>,
}

impl ManifestPacker {
    /// Create a packer for the given artifact type.
    pub fn new(artifact_type: impl Into<String>) -> Self {
        Self {
            artifact_type: artifact_type.into(),
            layers: Vec::new(),
        }
    }

    /// Hash a local file and add it as the next layer.
    pub fn add_file(&mut self, path: &Path, title: &str, media_type: &str) -> Result<Descriptor> {
        if media_type.is_empty() {
            return Err(RegistryError::pack("layer media type is empty"));
        }

        let (digest, size) = Digest::of_file(path).map_err(|e| {
            RegistryError::staging(format!("cannot read {}: {}", path.display(), e))
        })?;

        let descriptor = Descriptor {
            media_type: media_type.to_string(),
            digest,
            size,
            annotations: BTreeMap::new(),
        }
        .with_annotation(ANNOTATION_TITLE, title);

        self.layers.push(PackedBlob {
            descriptor: descriptor.clone(),
            source: BlobSource::File(path.to_path_buf()),
        });

        Ok(descriptor)
    }

    /// Assemble the manifest with the given annotations.
    pub fn pack(self, annotations: BTreeMap<String, String>) -> Result<PackedArtifact> {
        if self.artifact_type.is_empty() {
            return Err(RegistryError::pack("artifact type is empty"));
        }
        if self.layers.is_empty() {
            return Err(RegistryError::pack("manifest needs at least one layer"));
        }

        let layers = self.layers.iter().map(|l| l.descriptor.clone()).collect();
        let manifest = Manifest::artifact(self.artifact_type, layers, annotations);
        let manifest_bytes = manifest.to_bytes()?;
        let descriptor = Descriptor::for_bytes(MANIFEST_MEDIA_TYPE, &manifest_bytes);

        let mut blobs = Vec::with_capacity(self.layers.len() + 1);
        blobs.push(PackedBlob {
            descriptor: manifest.config.clone(),
            source: BlobSource::Inline(EMPTY_JSON.to_vec()),
        });
        blobs.extend(self.layers);

        tracing::debug!(
            "Packed manifest {} with {} layer(s)",
            descriptor.digest,
            manifest.layers.len()
        );

        Ok(PackedArtifact {
            manifest,
            manifest_bytes,
            descriptor,
            blobs,
        })
    }
}
