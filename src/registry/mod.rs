//! Module registry core.
//!
//! Maps module identities onto the artifact store:
//! - `namespace/name` is the repository
//! - `version` is the tag
//! - `provider`, `version` and `namespace` are manifest annotations
//!
//! and implements listing, publishing and fetching on top of that mapping.
//! Every operation opens its own store session through the
//! [`StoreConnector`]; no state is kept between calls.
//!
//! Publishing the same namespace/name/version twice moves the tag to the
//! newer manifest. Concurrent publishes of one identity are not coordinated:
//! whichever manifest push finishes last wins.
//!
//! # Example
//!
//! ```
//! use modreg::module::{ListQuery, ModuleIdentity};
//! use modreg::registry::ModuleRegistry;
//! use modreg::staging::StagingArea;
//! use modreg::store::MemoryStore;
//!
//! let staging = tempfile::tempdir().unwrap();
//! let registry = ModuleRegistry::new(MemoryStore::new(), StagingArea::new(staging.path()));
//!
//! let id = ModuleIdentity::new("acme", "vpc", "aws", "1.0.0");
//! registry.publish_module(&id, &mut &b"0123456789"[..]).unwrap();
//!
//! let page = registry.list_modules(&ListQuery::all()).unwrap();
//! assert_eq!(page.total, 1);
//! assert_eq!(registry.get_module_data(&id).unwrap(), b"0123456789");
//! ```

mod listing;

use std::io::Read;

use crate::config::StoreConfig;
use crate::error::{RegistryError, Result};
use crate::module::{ListQuery, ModuleIdentity, ModulePage};
use crate::oci::{Descriptor, Manifest, MODULE_ARTIFACT_TYPE, MODULE_LAYER_MEDIA_TYPE};
use crate::operation::Operation;
use crate::pack::ManifestPacker;
use crate::staging::StagingArea;
use crate::store::{copy_artifact, ArtifactStore, RemoteConnector, StoreConnector};

/// Title recorded on the archive layer.
///
/// Fixed rather than derived from the staging file so that re-publishing the
/// same bytes yields the same manifest digest.
pub const ARCHIVE_TITLE: &str = "module.tgz";

/// List, publish and fetch modules stored as OCI artifacts.
pub struct ModuleRegistry<C> {
    connector: C,
    staging: StagingArea,
    list_concurrency: usize,
}

impl ModuleRegistry<RemoteConnector> {
    /// Create a registry backed by the remote store in `config`.
    pub fn from_config(config: StoreConfig) -> Self {
        let staging = StagingArea::new(config.staging_dir.clone());
        let concurrency = config.list_concurrency;
        Self::new(RemoteConnector::new(config), staging).with_list_concurrency(concurrency)
    }
}

impl<C: StoreConnector> ModuleRegistry<C> {
    /// Create a registry from a connector and a staging area.
    pub fn new(connector: C, staging: StagingArea) -> Self {
        Self {
            connector,
            staging,
            list_concurrency: crate::config::DEFAULT_LIST_CONCURRENCY,
        }
    }

    /// Set how many repositories are enumerated in parallel.
    pub fn with_list_concurrency(mut self, concurrency: usize) -> Self {
        self.list_concurrency = concurrency.max(1);
        self
    }

    /// Get the connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Get the staging area.
    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// List modules matching `query`.
    pub fn list_modules(&self, query: &ListQuery) -> Result<ModulePage> {
        self.list_modules_with(query, &Operation::unbounded())
    }

    /// List modules under an operation deadline.
    ///
    /// Namespace and name filter repositories, the provider filter is
    /// checked against the provider stored on each manifest, and offset and
    /// limit select a window of the sorted result. `total` counts every
    /// match before the window is applied.
    pub fn list_modules_with(&self, query: &ListQuery, op: &Operation) -> Result<ModulePage> {
        let store = self.connector.connect(op)?;

        op.check("listing repositories")?;
        let repositories = store.repositories()?;
        let candidates = listing::candidates(&repositories, query);
        tracing::debug!(
            "Found {} repositories, {} match the filter",
            repositories.len(),
            candidates.len()
        );

        let mut modules = listing::describe_all(&store, &candidates, query, op, self.list_concurrency)?;
        modules.sort_by(|a, b| {
            (&a.identity.namespace, &a.identity.name, &a.identity.version).cmp(&(
                &b.identity.namespace,
                &b.identity.name,
                &b.identity.version,
            ))
        });

        let total = modules.len();
        let modules = query.paginate(modules);
        tracing::info!("Listed {} of {} module(s)", modules.len(), total);

        Ok(ModulePage { modules, total })
    }

    /// Publish a module archive under `identity`.
    ///
    /// Returns the descriptor of the tagged manifest.
    pub fn publish_module(&self, identity: &ModuleIdentity, data: &mut dyn Read) -> Result<Descriptor> {
        self.publish_module_with(identity, data, &Operation::unbounded())
    }

    /// Publish a module archive under an operation deadline.
    ///
    /// The archive is staged and packed locally before the store is
    /// contacted; the staged file is removed on every exit path.
    pub fn publish_module_with(
        &self,
        identity: &ModuleIdentity,
        data: &mut dyn Read,
        op: &Operation,
    ) -> Result<Descriptor> {
        identity.validate()?;
        let repository = identity.repository();

        op.check("staging")?;
        let staged = self.staging.stage(data)?;

        let mut packer = ManifestPacker::new(MODULE_ARTIFACT_TYPE);
        packer.add_file(staged.path(), ARCHIVE_TITLE, MODULE_LAYER_MEDIA_TYPE)?;
        let packed = packer.pack(identity.annotations())?;

        let store = self.connector.connect(op)?;
        copy_artifact(&store, &repository, identity.tag(), &packed, op)?;

        tracing::info!(
            "Published {} as {}:{} ({})",
            identity,
            repository,
            identity.tag(),
            packed.descriptor.digest
        );

        Ok(packed.descriptor)
    }

    /// Fetch the archive bytes of a published module.
    pub fn get_module_data(&self, identity: &ModuleIdentity) -> Result<Vec<u8>> {
        self.get_module_data_with(identity, &Operation::unbounded())
    }

    /// Fetch the archive bytes under an operation deadline.
    ///
    /// A module manifest has exactly one layer, the module archive; any other
    /// shape is reported as [`RegistryError::Protocol`]. The provider is not
    /// part of the address and is only compared for logging.
    pub fn get_module_data_with(&self, identity: &ModuleIdentity, op: &Operation) -> Result<Vec<u8>> {
        identity.validate()?;
        let repository = identity.repository();

        let store = self.connector.connect(op)?;

        op.check("manifest download")?;
        let (digest, bytes) = store.pull_manifest(&repository, identity.tag())?;
        let manifest = Manifest::from_slice(&bytes)?;
        let layer = archive_layer(&manifest, &repository, identity.tag())?;

        if let Some(stored) = manifest.annotation(crate::oci::ANNOTATION_PROVIDER) {
            if !identity.provider.is_empty() && stored != identity.provider {
                tracing::warn!(
                    "{} was published with provider '{}', requested '{}'",
                    repository,
                    stored,
                    identity.provider
                );
            }
        }

        op.check("archive download")?;
        let data = store.pull_blob(&repository, layer)?;

        tracing::info!(
            "Fetched {} ({} bytes, manifest {})",
            identity,
            data.len(),
            digest
        );

        Ok(data)
    }
}

/// The single archive layer of a module manifest.
fn archive_layer<'a>(manifest: &'a Manifest, repository: &str, tag: &str) -> Result<&'a Descriptor> {
    match manifest.layers.as_slice() {
        [layer] if layer.media_type == MODULE_LAYER_MEDIA_TYPE => Ok(layer),
        [layer] => Err(RegistryError::protocol(format!(
            "{}:{} layer has media type '{}', expected '{}'",
            repository, tag, layer.media_type, MODULE_LAYER_MEDIA_TYPE
        ))),
        layers => Err(RegistryError::protocol(format!(
            "{}:{} has {} layers, expected exactly one module archive",
            repository,
            tag,
            layers.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::oci::{Descriptor, EMPTY_JSON};
    use crate::store::{ArtifactStore, MemoryStore};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn registry(store: &MemoryStore, temp: &TempDir) -> ModuleRegistry<MemoryStore> {
        ModuleRegistry::new(store.clone(), StagingArea::new(temp.path()))
    }

    fn publish(registry: &ModuleRegistry<MemoryStore>, id: &ModuleIdentity, data: &[u8]) {
        registry.publish_module(id, &mut &data[..]).unwrap();
    }

    #[test]
    fn publish_then_fetch_round_trips() {
        let store = MemoryStore::new();
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);
        let id = ModuleIdentity::new("acme", "vpc", "aws", "1.0.0");

        publish(&registry, &id, b"0123456789");
        assert_eq!(registry.get_module_data(&id).unwrap(), b"0123456789");
    }

    #[test]
    fn publish_records_annotations() {
        let store = MemoryStore::new();
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);
        let id = ModuleIdentity::new("acme", "vpc", "aws", "1.0.0");

        let descriptor = registry.publish_module(&id, &mut &b"x"[..]).unwrap();
        let (digest, bytes) = store.pull_manifest("acme/vpc", "1.0.0").unwrap();
        let manifest = Manifest::from_slice(&bytes).unwrap();

        assert_eq!(digest, descriptor.digest);
        assert_eq!(manifest.artifact_type.as_deref(), Some(MODULE_ARTIFACT_TYPE));
        assert_eq!(manifest.annotations, id.annotations());
        assert_eq!(manifest.layers[0].annotations[crate::oci::ANNOTATION_TITLE], ARCHIVE_TITLE);
    }

    #[test]
    fn publish_cleans_staging_dir() {
        let store = MemoryStore::new();
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);

        publish(&registry, &ModuleIdentity::new("acme", "vpc", "aws", "1.0.0"), b"x");
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_push_cleans_staging_dir() {
        let store = MemoryStore::new();
        store.fail_blob_pushes(true);
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);

        let err = registry
            .publish_module(&ModuleIdentity::new("acme", "vpc", "aws", "1.0.0"), &mut &b"x"[..])
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Push);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn publish_rejects_invalid_identity_before_staging() {
        let store = MemoryStore::new();
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);

        let err = registry
            .publish_module(&ModuleIdentity::new("Acme", "vpc", "aws", "1.0.0"), &mut &b"x"[..])
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidIdentity);
        assert_eq!(store.blob_push_count(), 0);
    }

    #[test]
    fn offline_store_is_unavailable_for_every_operation() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);
        let id = ModuleIdentity::new("acme", "vpc", "aws", "1.0.0");

        assert_eq!(
            registry.list_modules(&ListQuery::all()).unwrap_err().kind(),
            ErrorKind::StoreUnavailable
        );
        assert_eq!(
            registry.publish_module(&id, &mut &b"x"[..]).unwrap_err().kind(),
            ErrorKind::StoreUnavailable
        );
        assert_eq!(
            registry.get_module_data(&id).unwrap_err().kind(),
            ErrorKind::StoreUnavailable
        );
    }

    #[test]
    fn fetch_rejects_multi_layer_manifest() {
        let store = MemoryStore::new();
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);

        let layer = Descriptor::for_bytes(MODULE_LAYER_MEDIA_TYPE, b"a");
        let manifest = Manifest::artifact(
            MODULE_ARTIFACT_TYPE,
            vec![layer.clone(), layer],
            BTreeMap::new(),
        );
        store.insert_raw_manifest("acme/vpc", "1.0.0", &manifest.to_bytes().unwrap());

        let err = registry
            .get_module_data(&ModuleIdentity::new("acme", "vpc", "aws", "1.0.0"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("2 layers"));
    }

    #[test]
    fn fetch_rejects_foreign_layer_type() {
        let store = MemoryStore::new();
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);

        let layer = Descriptor::for_bytes("application/vnd.oci.image.layer.v1.tar+gzip", EMPTY_JSON);
        let manifest = Manifest::artifact(MODULE_ARTIFACT_TYPE, vec![layer], BTreeMap::new());
        store.insert_raw_manifest("acme/vpc", "1.0.0", &manifest.to_bytes().unwrap());

        let err = registry
            .get_module_data(&ModuleIdentity::new("acme", "vpc", "aws", "1.0.0"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn fetch_ignores_provider_for_addressing() {
        let store = MemoryStore::new();
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);

        publish(&registry, &ModuleIdentity::new("acme", "vpc", "aws", "1.0.0"), b"aws");
        let data = registry
            .get_module_data(&ModuleIdentity::new("acme", "vpc", "gcp", "1.0.0"))
            .unwrap();
        assert_eq!(data, b"aws");
    }

    #[test]
    fn canceled_publish_leaves_no_tag() {
        let store = MemoryStore::new();
        let temp = TempDir::new().unwrap();
        let registry = registry(&store, &temp);
        let token = crate::operation::CancelToken::new();
        token.cancel();

        let err = registry
            .publish_module_with(
                &ModuleIdentity::new("acme", "vpc", "aws", "1.0.0"),
                &mut &b"x"[..],
                &Operation::unbounded().cancel_token(token),
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert!(store.repositories().unwrap().is_empty());
    }

    #[test]
    fn from_config_uses_configured_staging_and_concurrency() {
        let mut config = StoreConfig::new("localhost:5000").with_staging_dir("/var/tmp/modreg");
        config.list_concurrency = 9;

        let registry = ModuleRegistry::from_config(config);
        assert_eq!(registry.staging().root(), std::path::Path::new("/var/tmp/modreg"));
        assert_eq!(registry.list_concurrency, 9);
        assert_eq!(registry.connector().config().url, "localhost:5000");
    }
}
