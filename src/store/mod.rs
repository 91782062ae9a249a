//! Artifact store access.
//!
//! The registry core talks to the content-addressable store only through
//! the narrow [`ArtifactStore`] trait. A [`StoreConnector`] opens a fresh,
//! verified session for each operation; nothing is kept between calls.
//!
//! Two implementations are provided:
//! - [`RemoteStore`] - OCI distribution HTTP API over `reqwest`
//! - [`MemoryStore`] - in-process store for development and tests

pub mod memory;
pub mod remote;

pub use memory::MemoryStore;
pub use remote::{RemoteConnector, RemoteStore};

use crate::error::{RegistryError, Result};
use crate::oci::{Descriptor, Digest};
use crate::operation::Operation;
use crate::pack::PackedArtifact;

/// Operations the registry needs from a content-addressable store.
///
/// Implementations map failures onto the registry error kinds: reachability
/// problems are [`RegistryError::StoreUnavailable`], failed writes
/// [`RegistryError::Push`], failed reads [`RegistryError::Pull`], unknown
/// tags [`RegistryError::NotFound`] and malformed responses
/// [`RegistryError::Protocol`].
pub trait ArtifactStore {
    /// Verify the store is reachable and accepts our credentials.
    fn ping(&self) -> Result<()>;

    /// All repository names in the store.
    fn repositories(&self) -> Result<Vec<String>>;

    /// All tags in a repository.
    fn tags(&self, repository: &str) -> Result<Vec<String>>;

    /// Whether a blob is already present in a repository.
    fn blob_exists(&self, repository: &str, digest: &Digest) -> Result<bool>;

    /// Upload a blob.
    fn push_blob(&self, repository: &str, descriptor: &Descriptor, data: &[u8]) -> Result<()>;

    /// Download a blob.
    fn pull_blob(&self, repository: &str, descriptor: &Descriptor) -> Result<Vec<u8>>;

    /// Upload a manifest under a tag or digest reference.
    fn push_manifest(
        &self,
        repository: &str,
        reference: &str,
        media_type: &str,
        data: &[u8],
    ) -> Result<()>;

    /// Download the manifest a tag or digest points at.
    fn pull_manifest(&self, repository: &str, reference: &str) -> Result<(Digest, Vec<u8>)>;
}

/// Opens store sessions.
pub trait StoreConnector {
    type Store: ArtifactStore + Sync;

    /// Connect and ping, failing with [`RegistryError::StoreUnavailable`]
    /// if the store cannot be reached.
    fn connect(&self, op: &Operation) -> Result<Self::Store>;
}

/// Copy a packed artifact into a repository and tag it.
///
/// Blobs go first, skipping those the repository already has; the manifest
/// is pushed last so a failure never leaves the tag pointing at a manifest
/// with missing blobs.
pub fn copy_artifact<S: ArtifactStore + ?Sized>(
    store: &S,
    repository: &str,
    tag: &str,
    packed: &PackedArtifact,
    op: &Operation,
) -> Result<()> {
    for blob in &packed.blobs {
        op.check("blob upload")?;

        if store.blob_exists(repository, &blob.descriptor.digest)? {
            tracing::debug!("Blob {} already in {}", blob.descriptor.digest, repository);
            continue;
        }

        let data = blob.read()?;
        store.push_blob(repository, &blob.descriptor, &data)?;
        tracing::debug!(
            "Pushed blob {} ({} bytes) to {}",
            blob.descriptor.digest,
            blob.descriptor.size,
            repository
        );
    }

    op.check("manifest upload")?;
    store.push_manifest(
        repository,
        tag,
        &packed.descriptor.media_type,
        &packed.manifest_bytes,
    )?;

    Ok(())
}

/// Check that downloaded bytes match their descriptor.
pub(crate) fn verify_blob(repository: &str, descriptor: &Descriptor, data: &[u8]) -> Result<()> {
    if data.len() as u64 != descriptor.size || !descriptor.digest.verify(data) {
        return Err(RegistryError::Pull {
            repository: repository.to_string(),
            message: format!(
                "blob {} failed verification ({} bytes, expected {})",
                descriptor.digest,
                data.len(),
                descriptor.size
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::{MODULE_ARTIFACT_TYPE, MODULE_LAYER_MEDIA_TYPE};
    use crate::pack::ManifestPacker;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn packed(temp: &TempDir, data: &[u8]) -> PackedArtifact {
        let path = temp.path().join("module.tgz");
        std::fs::write(&path, data).unwrap();
        let mut packer = ManifestPacker::new(MODULE_ARTIFACT_TYPE);
        packer
            .add_file(&path, "module.tgz", MODULE_LAYER_MEDIA_TYPE)
            .unwrap();
        packer.pack(BTreeMap::new()).unwrap()
    }

    #[test]
    fn copy_pushes_blobs_and_tags_manifest() {
        let temp = TempDir::new().unwrap();
        let artifact = packed(&temp, b"archive");
        let store = MemoryStore::new();

        copy_artifact(&store, "acme/vpc", "1.0.0", &artifact, &Operation::unbounded()).unwrap();

        assert_eq!(store.tags("acme/vpc").unwrap(), vec!["1.0.0"]);
        let (digest, bytes) = store.pull_manifest("acme/vpc", "1.0.0").unwrap();
        assert_eq!(digest, artifact.descriptor.digest);
        assert_eq!(bytes, artifact.manifest_bytes);
        assert!(store
            .blob_exists("acme/vpc", &artifact.blobs[1].descriptor.digest)
            .unwrap());
    }

    #[test]
    fn copy_skips_existing_blobs() {
        let temp = TempDir::new().unwrap();
        let artifact = packed(&temp, b"archive");
        let store = MemoryStore::new();
        let op = Operation::unbounded();

        copy_artifact(&store, "acme/vpc", "1.0.0", &artifact, &op).unwrap();
        let pushes = store.blob_push_count();
        copy_artifact(&store, "acme/vpc", "1.0.1", &artifact, &op).unwrap();

        assert_eq!(store.blob_push_count(), pushes);
        assert_eq!(store.tags("acme/vpc").unwrap(), vec!["1.0.0", "1.0.1"]);
    }

    #[test]
    fn failed_blob_push_leaves_no_tag() {
        let temp = TempDir::new().unwrap();
        let artifact = packed(&temp, b"archive");
        let store = MemoryStore::new();
        store.fail_blob_pushes(true);

        let err = copy_artifact(&store, "acme/vpc", "1.0.0", &artifact, &Operation::unbounded())
            .unwrap_err();

        assert!(matches!(err, RegistryError::Push { .. }));
        assert!(store.repositories().unwrap().is_empty());
        assert!(store
            .pull_manifest("acme/vpc", "1.0.0")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn canceled_copy_pushes_nothing() {
        let temp = TempDir::new().unwrap();
        let artifact = packed(&temp, b"archive");
        let store = MemoryStore::new();
        let token = crate::operation::CancelToken::new();
        token.cancel();
        let op = Operation::unbounded().cancel_token(token);

        let err = copy_artifact(&store, "acme/vpc", "1.0.0", &artifact, &op).unwrap_err();
        assert!(matches!(err, RegistryError::Canceled { .. }));
        assert_eq!(store.blob_push_count(), 0);
    }

    #[test]
    fn verify_blob_rejects_mismatch() {
        let descriptor = Descriptor::for_bytes(MODULE_LAYER_MEDIA_TYPE, b"expected");
        assert!(verify_blob("acme/vpc", &descriptor, b"expected").is_ok());
        let err = verify_blob("acme/vpc", &descriptor, b"different").unwrap_err();
        assert!(matches!(err, RegistryError::Pull { .. }));
    }
}
