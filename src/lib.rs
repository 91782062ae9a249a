//! modreg - Infrastructure module registry backed by an OCI artifact store.
//!
//! Modules are published as OCI artifacts: `namespace/name` becomes the
//! repository, the version becomes the tag, and the archive is the single
//! layer of an image manifest annotated with the module's identity.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Layered store configuration
//! - [`error`] - Error types and result aliases
//! - [`module`] - Module identities, records and list queries
//! - [`oci`] - Digests, descriptors and image manifests
//! - [`operation`] - Deadlines and cancellation
//! - [`pack`] - Building artifact manifests from files
//! - [`registry`] - List, publish and fetch
//! - [`staging`] - Temporary archive files
//! - [`store`] - Artifact store sessions (remote and in-memory)
//!
//! # Example
//!
//! ```
//! use modreg::module::ModuleIdentity;
//!
//! let id = ModuleIdentity::new("acme", "vpc", "aws", "1.0.0");
//! assert_eq!(id.repository(), "acme/vpc");
//! assert_eq!(id.tag(), "1.0.0");
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod module;
pub mod oci;
pub mod operation;
pub mod pack;
pub mod registry;
pub mod staging;
pub mod store;

pub use error::{ErrorKind, RegistryError, Result};
