//! In-process artifact store.
//!
//! Behaves like a distribution registry for the operations the registry core
//! uses: pushed blobs are digest-checked, manifests are rejected while their
//! blobs are missing, and tags are mutable pointers to manifest digests.
//! Clones share the same state, so a store handed to a connector can still be
//! inspected by the test that created it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ArtifactStore, StoreConnector};
use crate::error::{RegistryError, Result};
use crate::oci::{Descriptor, Digest, Manifest};
use crate::operation::Operation;

#[derive(Debug, Default)]
struct Repository {
    blobs: HashMap<Digest, Vec<u8>>,
    manifests: HashMap<Digest, Vec<u8>>,
    tags: BTreeMap<String, Digest>,
}

#[derive(Debug, Default)]
struct State {
    repositories: BTreeMap<String, Repository>,
    offline: bool,
    fail_blob_pushes: bool,
}

/// An artifact store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    blob_pushes: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate the store going down (or coming back).
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Make every blob upload fail.
    pub fn fail_blob_pushes(&self, fail: bool) {
        self.lock().fail_blob_pushes = fail;
    }

    /// Number of blob uploads accepted so far.
    pub fn blob_push_count(&self) -> usize {
        self.blob_pushes.load(Ordering::SeqCst)
    }

    /// Store a raw manifest without any checks, for seeding odd content.
    pub fn insert_raw_manifest(&self, repository: &str, tag: &str, data: &[u8]) -> Digest {
        let digest = Digest::of(data);
        let mut state = self.lock();
        let repo = state.repositories.entry(repository.to_string()).or_default();
        repo.manifests.insert(digest.clone(), data.to_vec());
        repo.tags.insert(tag.to_string(), digest.clone());
        digest
    }

    fn unavailable() -> RegistryError {
        RegistryError::StoreUnavailable {
            url: "memory://".to_string(),
            message: "store is offline".to_string(),
        }
    }

    fn online(&self) -> Result<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.offline {
            return Err(Self::unavailable());
        }
        Ok(state)
    }
}

impl ArtifactStore for MemoryStore {
    fn ping(&self) -> Result<()> {
        self.online().map(|_| ())
    }

    fn repositories(&self) -> Result<Vec<String>> {
        let state = self.online()?;
        Ok(state
            .repositories
            .iter()
            .filter(|(_, repo)| !repo.tags.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn tags(&self, repository: &str) -> Result<Vec<String>> {
        let state = self.online()?;
        let repo = state
            .repositories
            .get(repository)
            .ok_or_else(|| RegistryError::NotFound {
                repository: repository.to_string(),
                reference: "tags".to_string(),
            })?;
        Ok(repo.tags.keys().cloned().collect())
    }

    fn blob_exists(&self, repository: &str, digest: &Digest) -> Result<bool> {
        let state = self.online()?;
        Ok(state
            .repositories
            .get(repository)
            .is_some_and(|repo| repo.blobs.contains_key(digest)))
    }

    fn push_blob(&self, repository: &str, descriptor: &Descriptor, data: &[u8]) -> Result<()> {
        let mut state = self.online()?;
        let push_error = |message: String| RegistryError::Push {
            repository: repository.to_string(),
            message,
        };

        if state.fail_blob_pushes {
            return Err(push_error("blob upload rejected".to_string()));
        }
        if !descriptor.digest.verify(data) {
            return Err(push_error(format!(
                "digest mismatch for blob {}",
                descriptor.digest
            )));
        }

        state
            .repositories
            .entry(repository.to_string())
            .or_default()
            .blobs
            .insert(descriptor.digest.clone(), data.to_vec());
        self.blob_pushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pull_blob(&self, repository: &str, descriptor: &Descriptor) -> Result<Vec<u8>> {
        let state = self.online()?;
        state
            .repositories
            .get(repository)
            .and_then(|repo| repo.blobs.get(&descriptor.digest))
            .cloned()
            .ok_or_else(|| RegistryError::Pull {
                repository: repository.to_string(),
                message: format!("blob {} not found", descriptor.digest),
            })
    }

    fn push_manifest(
        &self,
        repository: &str,
        reference: &str,
        _media_type: &str,
        data: &[u8],
    ) -> Result<()> {
        let mut state = self.online()?;
        let push_error = |message: String| RegistryError::Push {
            repository: repository.to_string(),
            message,
        };

        let manifest = Manifest::from_slice(data).map_err(|e| push_error(e.to_string()))?;
        let repo = state.repositories.entry(repository.to_string()).or_default();

        if let Some(missing) = manifest.blobs().find(|d| !repo.blobs.contains_key(&d.digest)) {
            return Err(push_error(format!(
                "manifest references unknown blob {}",
                missing.digest
            )));
        }

        let digest = Digest::of(data);
        repo.manifests.insert(digest.clone(), data.to_vec());
        if reference != digest.as_str() {
            repo.tags.insert(reference.to_string(), digest);
        }
        Ok(())
    }

    fn pull_manifest(&self, repository: &str, reference: &str) -> Result<(Digest, Vec<u8>)> {
        let state = self.online()?;
        let not_found = || RegistryError::NotFound {
            repository: repository.to_string(),
            reference: reference.to_string(),
        };

        let repo = state.repositories.get(repository).ok_or_else(not_found)?;
        let digest = match repo.tags.get(reference) {
            Some(digest) => digest.clone(),
            None => Digest::parse(reference).map_err(|_| not_found())?,
        };
        let data = repo.manifests.get(&digest).ok_or_else(not_found)?;

        Ok((digest, data.clone()))
    }
}

impl StoreConnector for MemoryStore {
    type Store = MemoryStore;

    fn connect(&self, op: &Operation) -> Result<MemoryStore> {
        op.check("connect")?;
        self.ping()?;
        Ok(self.clone())
    }
}
