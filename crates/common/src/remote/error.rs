use reqwest::StatusCode;

/// Failure of the security token handshake, classified by the status code
/// the handshake came back with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// 3xx: usually a wrong host or credentials bouncing to a logon page
    #[error("redirect ({0}), please check your credential")]
    Redirect(StatusCode),
    /// 4xx
    #[error("request is not accepted ({0})")]
    Rejected(StatusCode),
    /// 5xx
    #[error("server is down ({0})")]
    ServiceUnavailable(StatusCode),
    #[error("could not fetch security token ({0}), please check your credential")]
    TokenUnavailable(StatusCode),
}

impl CredentialError {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_redirection() {
            Self::Redirect(status)
        } else if status.is_client_error() {
            Self::Rejected(status)
        } else if status.is_server_error() {
            Self::ServiceUnavailable(status)
        } else {
            Self::TokenUnavailable(status)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status} for {path}")]
    UnexpectedStatus { status: StatusCode, path: String },
    #[error("failed to decode response for {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid remote url: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
