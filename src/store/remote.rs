//! OCI distribution HTTP client.
//!
//! Implements [`ArtifactStore`] against a remote registry speaking the OCI
//! distribution API, authenticating every request with static basic-auth
//! credentials from the [`StoreConfig`].

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE, LINK, LOCATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::{verify_blob, ArtifactStore, StoreConnector};
use crate::config::StoreConfig;
use crate::error::{RegistryError, Result};
use crate::oci::{Descriptor, Digest, MANIFEST_MEDIA_TYPE};
use crate::operation::Operation;

/// Page size requested from the catalog and tag list endpoints.
const PAGE_SIZE: usize = 100;

const DIGEST_HEADER: &str = "docker-content-digest";

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    repositories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// A session with a remote OCI registry.
pub struct RemoteStore {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl RemoteStore {
    /// Create a session using the configured timeout.
    ///
    /// This does not contact the store; use [`RemoteConnector`] to get a
    /// pinged session.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        Self::with_timeout(config, config.timeout)
    }

    /// Create a session with a specific per-request timeout.
    pub fn with_timeout(config: &StoreConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("modreg/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Config {
                message: format!("cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone(),
            timeout,
            deadline: None,
        })
    }

    /// Stop issuing requests at `deadline`.
    ///
    /// Requests that would outlive the deadline get a shorter timeout, and
    /// running out of time fails with [`RegistryError::Canceled`] rather
    /// than [`RegistryError::StoreUnavailable`].
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// The store base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v2/{}", self.base_url, path)
    }

    /// Resolve a `Location` or `Link` target against the base URL.
    fn resolve(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else if target.starts_with('/') {
            format!("{}{}", self.base_url, target)
        } else {
            format!("{}/{}", self.base_url, target)
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_deref()),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        // Time left before the deadline, when it is shorter than the client timeout.
        let capped = self
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .filter(|left| *left < self.timeout);

        let request = match capped {
            Some(left) if left.is_zero() => {
                return Err(RegistryError::Canceled {
                    message: format!("deadline expired before {}", what),
                })
            }
            Some(left) => request.timeout(left),
            None => request,
        };

        request.send().map_err(|e| {
            if e.is_timeout() && capped.is_some() {
                return RegistryError::Canceled {
                    message: format!("deadline expired during {}", what),
                };
            }
            RegistryError::StoreUnavailable {
                url: self.base_url.clone(),
                message: if e.is_timeout() {
                    format!("{} timed out", what)
                } else {
                    format!("{} failed: {}", what, e)
                },
            }
        })
    }

    /// Follow `Link: <...>; rel="next"` pages and gather the entries.
    ///
    /// `on_status` turns an unsuccessful HTTP status into the error to return.
    fn collect_pages<T, F, E>(
        &self,
        first: String,
        what: &str,
        mut extract: F,
        on_status: E,
    ) -> Result<Vec<String>>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> Vec<String>,
        E: Fn(StatusCode) -> RegistryError,
    {
        let mut entries = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            let response = self.send(self.request(Method::GET, &url), what)?;
            let status = response.status();

            if !status.is_success() {
                return Err(on_status(status));
            }

            next = next_link(response.headers()).map(|link| self.resolve(&link));

            let page: T = response
                .json()
                .map_err(|e| RegistryError::protocol(format!("malformed response while {}: {}", what, e)))?;
            entries.extend(extract(page));
        }

        Ok(entries)
    }

    fn push_error(repository: &str, message: impl Into<String>) -> RegistryError {
        RegistryError::Push {
            repository: repository.to_string(),
            message: message.into(),
        }
    }

    fn pull_error(repository: &str, message: impl Into<String>) -> RegistryError {
        RegistryError::Pull {
            repository: repository.to_string(),
            message: message.into(),
        }
    }
}

impl ArtifactStore for RemoteStore {
    fn ping(&self) -> Result<()> {
        let response = self.send(self.request(Method::GET, &self.endpoint("")), "ping")?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let message = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                format!("credentials rejected (HTTP {})", status.as_u16())
            }
            _ => format!("ping returned HTTP {}", status.as_u16()),
        };
        Err(RegistryError::StoreUnavailable {
            url: self.base_url.clone(),
            message,
        })
    }

    fn repositories(&self) -> Result<Vec<String>> {
        let first = self.endpoint(&format!("_catalog?n={}", PAGE_SIZE));
        self.collect_pages(
            first,
            "listing repositories",
            |page: Catalog| page.repositories,
            |status| match status {
                StatusCode::NOT_FOUND => RegistryError::protocol(format!(
                    "store does not support the catalog API (HTTP {})",
                    status.as_u16()
                )),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RegistryError::protocol(
                    format!("catalog access forbidden (HTTP {})", status.as_u16()),
                ),
                _ => RegistryError::protocol(format!(
                    "HTTP {} while listing repositories",
                    status
                )),
            },
        )
    }

    fn tags(&self, repository: &str) -> Result<Vec<String>> {
        let first = self.endpoint(&format!("{}/tags/list?n={}", repository, PAGE_SIZE));
        let what = format!("listing tags of {}", repository);
        self.collect_pages(
            first,
            &what,
            |page: TagList| page.tags.unwrap_or_default(),
            |status| match status {
                StatusCode::NOT_FOUND => RegistryError::NotFound {
                    repository: repository.to_string(),
                    reference: "tags".to_string(),
                },
                _ => RegistryError::protocol(format!("HTTP {} while {}", status, what)),
            },
        )
    }

    fn blob_exists(&self, repository: &str, digest: &Digest) -> Result<bool> {
        let url = self.endpoint(&format!("{}/blobs/{}", repository, digest));
        let response = self.send(self.request(Method::HEAD, &url), "checking blob")?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Self::push_error(
                repository,
                format!("HTTP {} checking blob {}", status, digest),
            )),
        }
    }

    fn push_blob(&self, repository: &str, descriptor: &Descriptor, data: &[u8]) -> Result<()> {
        let start = self.endpoint(&format!("{}/blobs/uploads/", repository));
        let response = self.send(self.request(Method::POST, &start), "starting upload")?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(Self::push_error(
                repository,
                format!("HTTP {} starting blob upload", response.status()),
            ));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Self::push_error(repository, "upload response has no Location"))?;

        let upload = self.resolve(location);
        let separator = if upload.contains('?') { '&' } else { '?' };
        let url = format!("{}{}digest={}", upload, separator, descriptor.digest);

        let response = self.send(
            self.request(Method::PUT, &url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(data.to_vec()),
            "uploading blob",
        )?;

        if !response.status().is_success() {
            return Err(Self::push_error(
                repository,
                format!(
                    "HTTP {} uploading blob {}",
                    response.status(),
                    descriptor.digest
                ),
            ));
        }

        Ok(())
    }

    fn pull_blob(&self, repository: &str, descriptor: &Descriptor) -> Result<Vec<u8>> {
        let url = self.endpoint(&format!("{}/blobs/{}", repository, descriptor.digest));
        let response = self.send(self.request(Method::GET, &url), "downloading blob")?;

        if !response.status().is_success() {
            return Err(Self::pull_error(
                repository,
                format!(
                    "HTTP {} downloading blob {}",
                    response.status(),
                    descriptor.digest
                ),
            ));
        }

        let data = response
            .bytes()
            .map_err(|e| Self::pull_error(repository, format!("reading blob: {}", e)))?
            .to_vec();
        verify_blob(repository, descriptor, &data)?;
        Ok(data)
    }

    fn push_manifest(
        &self,
        repository: &str,
        reference: &str,
        media_type: &str,
        data: &[u8],
    ) -> Result<()> {
        let url = self.endpoint(&format!("{}/manifests/{}", repository, reference));
        let response = self.send(
            self.request(Method::PUT, &url)
                .header(CONTENT_TYPE, media_type)
                .body(data.to_vec()),
            "uploading manifest",
        )?;

        if !response.status().is_success() {
            return Err(Self::push_error(
                repository,
                format!("HTTP {} tagging {}", response.status(), reference),
            ));
        }

        Ok(())
    }

    fn pull_manifest(&self, repository: &str, reference: &str) -> Result<(Digest, Vec<u8>)> {
        let url = self.endpoint(&format!("{}/manifests/{}", repository, reference));
        let response = self.send(
            self.request(Method::GET, &url)
                .header(ACCEPT, MANIFEST_MEDIA_TYPE),
            "downloading manifest",
        )?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(RegistryError::NotFound {
                    repository: repository.to_string(),
                    reference: reference.to_string(),
                })
            }
            status if !status.is_success() => {
                return Err(Self::pull_error(
                    repository,
                    format!("HTTP {} downloading manifest {}", status, reference),
                ))
            }
            _ => {}
        }

        let advertised = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let data = response
            .bytes()
            .map_err(|e| Self::pull_error(repository, format!("reading manifest: {}", e)))?
            .to_vec();
        let digest = Digest::of(&data);

        if let Some(advertised) = advertised {
            if advertised != digest.as_str() {
                return Err(RegistryError::protocol(format!(
                    "manifest {}:{} advertised digest {} but hashes to {}",
                    repository, reference, advertised, digest
                )));
            }
        }

        Ok((digest, data))
    }
}

/// Opens pinged [`RemoteStore`] sessions from a [`StoreConfig`].
#[derive(Debug, Clone)]
pub struct RemoteConnector {
    config: StoreConfig,
}

impl RemoteConnector {
    /// Create a connector for the given configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl StoreConnector for RemoteConnector {
    type Store = RemoteStore;

    fn connect(&self, op: &Operation) -> Result<RemoteStore> {
        op.check("connect")?;

        let store = RemoteStore::new(&self.config)?.with_deadline(op.expires_at());

        tracing::debug!(
            "Pinging {} ({})",
            store.base_url(),
            if self.config.has_credentials() {
                "with credentials"
            } else {
                "anonymous"
            }
        );
        store.ping()?;
        tracing::debug!("Ping to {} succeeded", store.base_url());

        Ok(store)
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .find(|part| part.contains("rel=\"next\"") || part.contains("rel=next"))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part[start..].find('>')? + start;
            Some(part[start..end].to_string())
        })
}
