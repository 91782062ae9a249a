//! Repository and tag enumeration for module listings.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::error::{RegistryError, Result};
use crate::module::{split_repository, ListQuery, ModuleIdentity, ModuleRecord};
use crate::oci::{Manifest, ANNOTATION_PROVIDER, MODULE_ARTIFACT_TYPE, MODULE_LAYER_MEDIA_TYPE};
use crate::operation::Operation;
use crate::store::ArtifactStore;

/// A repository that passed the namespace and name filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Candidate {
    pub repository: String,
    pub namespace: String,
    pub name: String,
}

/// Keep repositories shaped like `namespace/name` that match the query.
pub(super) fn candidates(repositories: &[String], query: &ListQuery) -> Vec<Candidate> {
    repositories
        .iter()
        .filter_map(|repository| {
            let Some((namespace, name)) = split_repository(repository) else {
                tracing::debug!("Skipping repository {}: not namespace/name", repository);
                return None;
            };
            query.matches_repository(namespace, name).then(|| Candidate {
                repository: repository.clone(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Describe every candidate, spreading repositories over worker threads.
///
/// Workers pull the next repository index from a shared counter. The first
/// error in candidate order is returned and no partial result is produced.
pub(super) fn describe_all<S: ArtifactStore + Sync>(
    store: &S,
    candidates: &[Candidate],
    query: &ListQuery,
    op: &Operation,
    concurrency: usize,
) -> Result<Vec<ModuleRecord>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let workers = concurrency.clamp(1, candidates.len());
    let counter = AtomicUsize::new(0);
    let next = &counter;

    let mut results: Vec<(usize, Result<Vec<ModuleRecord>>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(move |_| {
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(candidate) = candidates.get(index) else {
                            break;
                        };
                        done.push((index, describe(store, candidate, query, op)));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    vec![(
                        usize::MAX,
                        Err(RegistryError::Other(anyhow::anyhow!(
                            "repository enumeration worker panicked"
                        ))),
                    )]
                })
            })
            .collect()
    });

    results.sort_by_key(|(index, _)| *index);

    let mut modules = Vec::new();
    for (_, result) in results {
        modules.extend(result?);
    }
    Ok(modules)
}

/// Enumerate the tags of one repository and read each tagged manifest.
fn describe<S: ArtifactStore + ?Sized>(
    store: &S,
    candidate: &Candidate,
    query: &ListQuery,
    op: &Operation,
) -> Result<Vec<ModuleRecord>> {
    op.check("listing tags")?;
    let tags = match store.tags(&candidate.repository) {
        Ok(tags) => tags,
        Err(RegistryError::NotFound { .. }) => {
            tracing::debug!("Repository {} vanished during listing", candidate.repository);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut records = Vec::with_capacity(tags.len());
    for tag in tags {
        op.check("reading manifests")?;

        let (digest, bytes) = match store.pull_manifest(&candidate.repository, &tag) {
            Ok(found) => found,
            Err(RegistryError::NotFound { .. }) => {
                tracing::debug!("Tag {}:{} vanished during listing", candidate.repository, tag);
                continue;
            }
            Err(RegistryError::Pull { message, .. }) => {
                return Err(RegistryError::protocol(format!(
                    "cannot read {}:{}: {}",
                    candidate.repository, tag, message
                )))
            }
            Err(e) => return Err(e),
        };
        let Some(manifest) = module_manifest(&candidate.repository, &tag, &bytes)? else {
            continue;
        };

        // Manifests without a provider annotation echo the filter argument.
        let provider = manifest
            .annotation(ANNOTATION_PROVIDER)
            .unwrap_or(query.provider.as_str())
            .to_string();
        if !query.matches_provider(&provider) {
            continue;
        }

        let archive_size = manifest
            .layers
            .iter()
            .find(|layer| layer.media_type == MODULE_LAYER_MEDIA_TYPE)
            .map(|layer| layer.size);

        records.push(ModuleRecord {
            identity: ModuleIdentity::new(
                candidate.namespace.as_str(),
                candidate.name.as_str(),
                provider,
                tag,
            ),
            digest,
            archive_size,
        });
    }

    Ok(records)
}

/// Decode a tagged manifest, or `None` if it is not a module artifact.
///
/// Image indexes and plain container images share the store with modules
/// and are skipped; only bytes that are not JSON at all are an error.
fn module_manifest(repository: &str, tag: &str, bytes: &[u8]) -> Result<Option<Manifest>> {
    let manifest = match Manifest::from_slice(bytes) {
        Ok(manifest) => manifest,
        Err(e) => {
            if serde_json::from_slice::<serde_json::Value>(bytes).is_err() {
                return Err(e);
            }
            tracing::debug!("Skipping {}:{}: not an image manifest", repository, tag);
            return Ok(None);
        }
    };

    if manifest.artifact_type.as_deref() != Some(MODULE_ARTIFACT_TYPE) {
        tracing::debug!(
            "Skipping {}:{}: artifact type {:?} is not a module",
            repository,
            tag,
            manifest.artifact_type
        );
        return Ok(None);
    }

    Ok(Some(manifest))
}
