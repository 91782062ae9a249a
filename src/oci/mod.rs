//! OCI artifact data model.
//!
//! Content digests, descriptors and the image manifest shape used to store
//! modules as OCI artifacts, plus the media types and annotation keys that
//! identify a module archive.
//!
//! # Example
//!
//! ```
//! use modreg::oci::{Descriptor, Digest, MODULE_LAYER_MEDIA_TYPE};
//!
//! let descriptor = Descriptor::for_bytes(MODULE_LAYER_MEDIA_TYPE, b"archive");
//! assert_eq!(descriptor.size, 7);
//! assert_eq!(descriptor.digest, Digest::of(b"archive"));
//! ```

pub mod digest;
pub mod manifest;

pub use digest::Digest;
pub use manifest::{Descriptor, Manifest};

/// Media type of an OCI image manifest.
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// Media type of the empty config blob used by artifact manifests.
pub const EMPTY_MEDIA_TYPE: &str = "application/vnd.oci.empty.v1+json";

/// Body of the empty config blob.
pub const EMPTY_JSON: &[u8] = b"{}";

/// Artifact type recorded on every module manifest.
pub const MODULE_ARTIFACT_TYPE: &str = "application/vnd.opentofu.module";

/// Media type of the single module archive layer (a gzipped tarball).
pub const MODULE_LAYER_MEDIA_TYPE: &str = "application/vnd.opentofu.module.v1+tgz";

/// Manifest annotation carrying the module provider.
pub const ANNOTATION_PROVIDER: &str = "org.opentofu.module.provider";

/// Manifest annotation carrying the module version.
pub const ANNOTATION_VERSION: &str = "org.opentofu.module.version";

/// Manifest annotation carrying the module namespace.
pub const ANNOTATION_NAMESPACE: &str = "org.opentofu.module.namespace";

/// Layer annotation carrying the file name of a blob.
pub const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";
