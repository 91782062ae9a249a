//! Content digests.
//!
//! Every blob and manifest in the store is addressed by the SHA-256 of its
//! bytes, written as `sha256:<64 lowercase hex chars>`.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{RegistryError, Result};

const ALGORITHM: &str = "sha256";

/// A content digest in `algorithm:hex` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Compute the digest of in-memory bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(format!("{}:{}", ALGORITHM, hex::encode(Sha256::digest(data))))
    }

    /// Compute the digest and size of a file without loading it whole.
    pub fn of_file(path: &Path) -> std::io::Result<(Self, u64)> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        let mut size = 0u64;

        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            size += n as u64;
        }

        let digest = Self(format!("{}:{}", ALGORITHM, hex::encode(hasher.finalize())));
        Ok((digest, size))
    }

    /// Parse a digest string, rejecting unknown algorithms and bad hex.
    pub fn parse(value: &str) -> Result<Self> {
        let (algorithm, encoded) = value
            .split_once(':')
            .ok_or_else(|| RegistryError::protocol(format!("malformed digest '{}'", value)))?;

        if algorithm != ALGORITHM {
            return Err(RegistryError::protocol(format!(
                "unsupported digest algorithm '{}'",
                algorithm
            )));
        }

        let valid_hex = encoded.len() == 64
            && encoded
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid_hex {
            return Err(RegistryError::protocol(format!(
                "malformed digest '{}'",
                value
            )));
        }

        Ok(Self(value.to_string()))
    }

    /// The hex-encoded part of the digest.
    pub fn hex(&self) -> &str {
        &self.0[ALGORITHM.len() + 1..]
    }

    /// The full `algorithm:hex` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that `data` hashes to this digest.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Digest {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}
