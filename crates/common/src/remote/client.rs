use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response, StatusCode};
use url::Url;

use super::config::{Credentials, RemoteConfig};
use super::error::{CredentialError, RemoteError};
use super::types::{DirectoryDetail, PathStat, StatDocument};

pub const CSRF_TOKEN_HEADER: &str = "x-csrf-token";

/// Token value asking the service to issue a fresh token
const TOKEN_FETCH: &str = "fetch";
/// Header value sent back with a 403 when the token is missing or stale
const TOKEN_REQUIRED: &str = "required";
/// Token value meaning "no token issued"
const TOKEN_UNSAFE: &str = "unsafe";

/// Read access to a remote file repository
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Whole content of the file at `path`
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteError>;

    /// Immediate children of the directory at `path`
    async fn read_directory(&self, path: &str) -> Result<DirectoryDetail, RemoteError>;

    /// Metadata of `path`, file or directory
    async fn stat(&self, path: &str) -> Result<PathStat, RemoteError>;
}

/// Authenticated session against the design-time file API.
///
/// Every request carries basic credentials and the current security token.
/// When the service answers `403` with `x-csrf-token: Required` the token is
/// refreshed and the request is replayed once.
pub struct RemoteClient {
    http: Client,
    credentials: Credentials,
    /// Origin plus base path
    base: Url,
    token: Mutex<String>,
}

impl RemoteClient {
    /// Resolve the host and fetch a first security token.
    ///
    /// A client returned from here always holds a token issued by the service.
    pub async fn connect(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let credentials = Credentials::from_config(config)?;

        let authority = credentials.authority();
        tokio::net::lookup_host(authority.as_str())
            .await
            .map_err(|source| RemoteError::Resolve {
                host: credentials.host.clone(),
                source,
            })?;

        let mut builder = Client::builder().redirect(Policy::none());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        let origin = credentials.origin();
        let mut base =
            Url::parse(&origin).map_err(|err| RemoteError::InvalidUrl(format!("{origin}: {err}")))?;
        base.path_segments_mut()
            .map_err(|()| RemoteError::InvalidUrl(origin.clone()))?
            .clear()
            .extend(segments(&config.base_path));

        let client = Self {
            http,
            credentials,
            base,
            token: Mutex::new(String::new()),
        };
        client.refresh_token().await?;

        tracing::info!(
            base = %client.base,
            username = %client.credentials.username,
            "connected to remote repository"
        );
        Ok(client)
    }

    /// The token currently attached to requests
    pub fn token(&self) -> String {
        self.token.lock().clone()
    }

    /// Ask the service for a new security token and keep it.
    pub async fn refresh_token(&self) -> Result<(), RemoteError> {
        let response = self
            .http
            .head(self.endpoint(&["info"])?)
            .header(CSRF_TOKEN_HEADER, TOKEN_FETCH)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;

        let status = response.status();
        let token = response
            .headers()
            .get(CSRF_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if token.is_empty() || token == TOKEN_UNSAFE {
            let err = CredentialError::from_status(status);
            tracing::error!(%status, error = %err, "security token handshake failed");
            return Err(err.into());
        }

        *self.token.lock() = token.to_string();
        tracing::debug!(%status, "security token refreshed");
        Ok(())
    }

    /// `<base>/<segments>`, each segment percent-encoded
    fn endpoint(&self, tail: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(tail);
        Ok(url)
    }

    /// `<base>/file<path>`; the root keeps its trailing slash
    fn file_url(&self, path: &str) -> Result<Url, RemoteError> {
        let mut tail = vec!["file"];
        tail.extend(segments(path));
        if tail.len() == 1 {
            tail.push("");
        }
        self.endpoint(&tail)
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        query: &[(&str, &str)],
    ) -> Result<Response, RemoteError> {
        let token = self.token();
        let response = self
            .http
            .request(method, url.clone())
            .query(query)
            .header(CSRF_TOKEN_HEADER, token)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;
        Ok(response)
    }

    /// Issue a request, refreshing the token and replaying once if the
    /// service demands a fresh one.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, RemoteError> {
        let url = self.file_url(path)?;
        let response = self.send(method.clone(), &url, query).await?;
        if !is_token_required(&response) {
            return Ok(response);
        }

        tracing::warn!(%url, "security token rejected, refreshing");
        self.refresh_token().await?;
        self.send(method, &url, query).await
    }

    async fn get_body(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, RemoteError> {
        let response = self.request(Method::GET, path, query).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(RemoteError::UnexpectedStatus {
                status,
                path: path.to_string(),
            });
        }

        let body = response.bytes().await?;
        tracing::debug!(path, %status, len = body.len(), "remote read");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Repository for RemoteClient {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.get_body(path, &[]).await
    }

    async fn read_directory(&self, path: &str) -> Result<DirectoryDetail, RemoteError> {
        let body = self.get_body(path, &[("depth", "1")]).await?;
        serde_json::from_slice(&body).map_err(|source| RemoteError::Decode {
            path: path.to_string(),
            source,
        })
    }

    async fn stat(&self, path: &str) -> Result<PathStat, RemoteError> {
        let body = self
            .get_body(path, &[("depth", "0"), ("parts", "meta")])
            .await?;
        StatDocument::decode(&body)
            .map(PathStat::from)
            .map_err(|source| RemoteError::Decode {
                path: path.to_string(),
                source,
            })
    }
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("base", &self.base)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn is_token_required(response: &Response) -> bool {
    response.status() == StatusCode::FORBIDDEN
        && response
            .headers()
            .get(CSRF_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case(TOKEN_REQUIRED))
}
