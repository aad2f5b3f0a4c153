//! The HTTP seam of the client.
//!
//! [`ApiClient`](crate::ApiClient) only talks to a [`Transport`]; the real one
//! is a blocking `reqwest` client, tests script their own.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::ApiError;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport {
    /// GET `url` with the given headers.
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ApiError>;

    /// POST `form` as `application/x-www-form-urlencoded`.
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, ApiError>;
}

/// `reqwest::blocking` transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("icd11/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ApiError::Http {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ApiError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let http_err = |source| ApiError::Http {
            url: url.to_string(),
            source,
        };
        let response = request.send().map_err(http_err)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(http_err)?;
        Ok(HttpResponse { status, body })
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, ApiError> {
        let http_err = |source| ApiError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.client.post(url).form(form).send().map_err(http_err)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(http_err)?;
        Ok(HttpResponse { status, body })
    }
}
