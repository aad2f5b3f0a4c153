//! Client of the WHO ICD API.
//!
//! OAuth2 client-credentials authentication, the `{release}` placeholder and
//! the error-shaped result convention live here; what to ask for is up to
//! the caller.

mod client;
pub mod transport;

use thiserror::Error;

pub use client::{
    ApiClient, RemoteError, extract_release_id, query_escape, remote_error, resolve_url,
};
pub use transport::{HttpResponse, HttpTransport, Transport};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("token request rejected with status {status}: {detail}")]
    Token { status: u16, detail: String },

    #[error("token response is not valid: {0}")]
    TokenFormat(#[source] serde_json::Error),

    #[error("cannot determine the current release: {0}")]
    Release(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
