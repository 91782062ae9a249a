//! Module identities and listing types.
//!
//! A module is addressed as `namespace/name/provider/version`. Namespace and
//! name form the store repository path, the version is the tag. The provider
//! is not part of the address: it is stored as a manifest annotation only,
//! so two publishes that differ just by provider land on the same tag.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::{RegistryError, Result};
use crate::oci::{Digest, ANNOTATION_NAMESPACE, ANNOTATION_PROVIDER, ANNOTATION_VERSION};

// OCI distribution grammar for one repository path component.
static PATH_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*$").expect("valid component regex")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$").expect("valid tag regex"));

/// The identity of one module version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleIdentity {
    pub namespace: String,
    pub name: String,
    pub provider: String,
    pub version: String,
}

impl ModuleIdentity {
    /// Create a new identity.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            provider: provider.into(),
            version: version.into(),
        }
    }

    /// The repository path (`namespace/name`).
    pub fn repository(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// The tag the module version is stored under.
    pub fn tag(&self) -> &str {
        &self.version
    }

    /// Check that namespace, name and version can be used as a store address.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("namespace", &self.namespace), ("name", &self.name)] {
            if !PATH_COMPONENT.is_match(value) {
                return Err(RegistryError::InvalidIdentity {
                    message: format!(
                        "{} '{}' must be lowercase alphanumerics separated by '.', '_', '__' or '-'",
                        field, value
                    ),
                });
            }
        }

        if !TAG.is_match(&self.version) {
            return Err(RegistryError::InvalidIdentity {
                message: format!("version '{}' is not a valid tag", self.version),
            });
        }

        Ok(())
    }

    /// The manifest annotations recorded for this identity.
    pub fn annotations(&self) -> BTreeMap<String, String> {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_PROVIDER.to_string(), self.provider.clone());
        annotations.insert(ANNOTATION_VERSION.to_string(), self.version.clone());
        annotations.insert(ANNOTATION_NAMESPACE.to_string(), self.namespace.clone());
        annotations
    }
}

impl std::fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.namespace, self.name, self.provider, self.version
        )
    }
}

/// Split a repository path into `(namespace, name)`.
///
/// Returns `None` unless the path has exactly two non-empty components.
pub fn split_repository(repository: &str) -> Option<(&str, &str)> {
    let (namespace, name) = repository.split_once('/')?;
    if namespace.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((namespace, name))
}

/// A module version discovered in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRecord {
    #[serde(flatten)]
    pub identity: ModuleIdentity,
    /// Digest of the tagged manifest.
    pub digest: Digest,
    /// Size of the module archive layer, when the manifest has one.
    pub archive_size: Option<u64>,
}

/// Filters and pagination for a listing.
///
/// Empty strings match everything. A `limit` of zero means no limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub namespace: String,
    pub name: String,
    pub provider: String,
    pub offset: usize,
    pub limit: usize,
}

impl ListQuery {
    /// A query matching every module.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Restrict to a module name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Restrict to a provider.
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Set the page window.
    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Whether a repository passes the namespace and name filters.
    pub fn matches_repository(&self, namespace: &str, name: &str) -> bool {
        (self.namespace.is_empty() || self.namespace == namespace)
            && (self.name.is_empty() || self.name == name)
    }

    /// Whether a stored provider passes the provider filter.
    pub fn matches_provider(&self, provider: &str) -> bool {
        self.provider.is_empty() || self.provider == provider
    }

    /// Apply offset and limit to a full result set.
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let window = items.into_iter().skip(self.offset);
        if self.limit == 0 {
            window.collect()
        } else {
            window.take(self.limit).collect()
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModulePage {
    pub modules: Vec<ModuleRecord>,
    /// Number of matching modules before pagination.
    pub total: usize,
}
