use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

use icd_config::{
    API_BASE, API_VERSION, Config, RELEASE_INDEX_PATH, RELEASE_PLACEHOLDER, TOKEN_ENDPOINT,
    TOKEN_SCOPE,
};

use crate::ApiError;
use crate::transport::{HttpResponse, HttpTransport, Transport};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Authenticated client of the ICD API.
///
/// The access token and the current release id are fetched on first use and
/// kept for the life of the client.
pub struct ApiClient<T = HttpTransport> {
    transport: T,
    client_id: String,
    client_secret: String,
    language: String,
    token: Option<String>,
    release: Option<String>,
}

impl ApiClient<HttpTransport> {
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Ok(Self::with_transport(HttpTransport::new()?, config))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(transport: T, config: &Config) -> Self {
        Self {
            transport,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            language: config.language().to_string(),
            token: None,
            release: config.release.clone(),
        }
    }

    /// GET `path_or_uri` and parse the body.
    ///
    /// Non-2xx statuses and bodies that are not JSON come back as
    /// `{"error": {"status_code": .., "detail": ..}}`; `Err` is left for
    /// transport and token failures.
    pub fn call(&mut self, path_or_uri: &str) -> Result<Value, ApiError> {
        let path = if path_or_uri.contains(RELEASE_PLACEHOLDER) {
            let release = self.release_id()?;
            path_or_uri.replace(RELEASE_PLACEHOLDER, &release)
        } else {
            path_or_uri.to_string()
        };
        let url = resolve_url(&path);
        let response = self.authorized_get(&url)?;
        Ok(shape_response(response))
    }

    /// The release every `{release}` placeholder stands for.
    pub fn release_id(&mut self) -> Result<String, ApiError> {
        if let Some(release) = &self.release {
            return Ok(release.clone());
        }

        let index = self.call(RELEASE_INDEX_PATH)?;
        if let Some(err) = remote_error(&index) {
            return Err(ApiError::Remote(err));
        }
        let latest = index
            .get("latestRelease")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Release("release index has no latestRelease".into()))?;
        let release = extract_release_id(latest)
            .ok_or_else(|| ApiError::Release(format!("cannot read a release id from '{}'", latest)))?;

        debug!(release = %release, "resolved current release");
        self.release = Some(release.clone());
        Ok(release)
    }

    fn authorized_get(&mut self, url: &str) -> Result<HttpResponse, ApiError> {
        let token = self.token()?;
        debug!(url, "GET");
        let response = self.send_get(url, &token)?;
        if response.status != 401 {
            trace!(status = response.status, body = %response.body, "response");
            return Ok(response);
        }

        // one refresh, one retry
        debug!("access token rejected, requesting a new one");
        self.token = None;
        let token = self.token()?;
        let response = self.send_get(url, &token)?;
        trace!(status = response.status, body = %response.body, "response after token refresh");
        Ok(response)
    }

    fn token(&mut self) -> Result<String, ApiError> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }

        debug!(endpoint = TOKEN_ENDPOINT, "requesting access token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", TOKEN_SCOPE),
        ];
        let response = self.transport.post_form(TOKEN_ENDPOINT, &form)?;
        if !response.is_success() {
            return Err(ApiError::Token {
                status: response.status,
                detail: response.body.trim().to_string(),
            });
        }
        let parsed: TokenResponse = serde_json::from_str(&response.body).map_err(ApiError::TokenFormat)?;
        self.token = Some(parsed.access_token.clone());
        Ok(parsed.access_token)
    }

    fn send_get(&self, url: &str, token: &str) -> Result<HttpResponse, ApiError> {
        let bearer = format!("Bearer {}", token);
        let headers = [
            ("Authorization", bearer.as_str()),
            ("Accept", "application/json"),
            ("Accept-Language", self.language.as_str()),
            ("API-Version", API_VERSION),
        ];
        self.transport.get(url, &headers)
    }
}

/// Absolute https URL for an API path or an entity URI.
///
/// Entity URIs in API responses use `http://id.who.int`; the API itself is
/// served over https only.
pub fn resolve_url(path_or_uri: &str) -> String {
    if let Some(rest) = path_or_uri.strip_prefix("http://id.who.int") {
        format!("{}{}", API_BASE, rest)
    } else if path_or_uri.starts_with("http://") || path_or_uri.starts_with("https://") {
        path_or_uri.to_string()
    } else if path_or_uri.starts_with('/') {
        format!("{}{}", API_BASE, path_or_uri)
    } else {
        format!("{}/{}", API_BASE, path_or_uri)
    }
}

/// Release id out of a release URI such as
/// `http://id.who.int/icd/release/11/2024-01/mms`.
pub fn extract_release_id(release_uri: &str) -> Option<String> {
    let url = Url::parse(release_uri).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let mms = segments.iter().rposition(|s| *s == "mms")?;
    let release = segments.get(mms.checked_sub(1)?)?;
    // `/icd/release/11/mms` is the index, not a release
    if *release == "11" {
        return None;
    }
    Some(release.to_string())
}

/// Percent-encode a query parameter value.
pub fn query_escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn shape_response(response: HttpResponse) -> Value {
    if response.is_success() {
        match serde_json::from_str::<Value>(&response.body) {
            Ok(value) => value,
            Err(_) => error_value(response.status, response.body.trim()),
        }
    } else {
        error_value(response.status, response.body.trim())
    }
}

fn error_value(status: u16, detail: &str) -> Value {
    json!({ "error": { "status_code": status, "detail": detail } })
}

/// An error-shaped API result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote API error {status_code}: {detail}")]
pub struct RemoteError {
    pub status_code: u16,
    pub detail: String,
}

/// The error carried by an error-shaped result, if it is one.
pub fn remote_error(value: &Value) -> Option<RemoteError> {
    // search responses carry `"error": false` on success
    let err = value.get("error").filter(|e| e.is_object())?;
    let status_code = err
        .get("status_code")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(0);
    let detail = match err.get("detail") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Some(RemoteError { status_code, detail })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Plays back canned responses and records every request.
    #[derive(Default)]
    struct ScriptedTransport {
        gets: RefCell<VecDeque<HttpResponse>>,
        tokens: RefCell<VecDeque<HttpResponse>>,
        get_log: RefCell<Vec<(String, Vec<(String, String)>)>>,
        token_requests: RefCell<usize>,
    }

    impl ScriptedTransport {
        fn reply(self, status: u16, body: &str) -> Self {
            self.gets.borrow_mut().push_back(HttpResponse::new(status, body));
            self
        }

        fn token(self, token: &str) -> Self {
            let body = format!(r#"{{"access_token":"{}","expires_in":3600,"token_type":"Bearer"}}"#, token);
            self.tokens.borrow_mut().push_back(HttpResponse::new(200, body));
            self
        }

        fn urls(&self) -> Vec<String> {
            self.get_log.borrow().iter().map(|(u, _)| u.clone()).collect()
        }

        fn header(&self, request: usize, name: &str) -> Option<String> {
            self.get_log.borrow()[request]
                .1
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
        }
    }

    impl Transport for &ScriptedTransport {
        fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ApiError> {
            self.get_log.borrow_mut().push((
                url.to_string(),
                headers.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
            ));
            Ok(self
                .gets
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| HttpResponse::new(500, "script exhausted")))
        }

        fn post_form(&self, _url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, ApiError> {
            assert!(form.contains(&("grant_type", "client_credentials")));
            assert!(form.contains(&("scope", TOKEN_SCOPE)));
            *self.token_requests.borrow_mut() += 1;
            Ok(self
                .tokens
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| HttpResponse::new(400, r#"{"error":"invalid_client"}"#)))
        }
    }

    fn config() -> Config {
        Config::new("id", "secret")
    }

    #[test]
    fn token_is_fetched_once_and_reused() {
        let script = ScriptedTransport::default()
            .token("t1")
            .reply(200, r#"{"title":"a"}"#)
            .reply(200, r#"{"title":"b"}"#);
        let mut client = ApiClient::with_transport(&script, &config());

        assert_eq!(client.call("/icd/entity/1").unwrap()["title"], "a");
        assert_eq!(client.call("/icd/entity/2").unwrap()["title"], "b");
        assert_eq!(*script.token_requests.borrow(), 1);
        assert_eq!(script.header(1, "Authorization").as_deref(), Some("Bearer t1"));
    }

    #[test]
    fn every_request_carries_version_and_language() {
        let mut cfg = config();
        cfg.language = Some("fr".into());
        let script = ScriptedTransport::default().token("t").reply(200, "{}");
        let mut client = ApiClient::with_transport(&script, &cfg);
        client.call("/icd/entity").unwrap();

        assert_eq!(script.header(0, "API-Version").as_deref(), Some("v2"));
        assert_eq!(script.header(0, "Accept-Language").as_deref(), Some("fr"));
        assert_eq!(script.header(0, "Accept").as_deref(), Some("application/json"));
    }

    #[test]
    fn unauthorized_refreshes_the_token_and_retries_once() {
        let script = ScriptedTransport::default()
            .token("stale")
            .token("fresh")
            .reply(401, "")
            .reply(200, r#"{"ok":true}"#);
        let mut client = ApiClient::with_transport(&script, &config());

        assert_eq!(client.call("/icd/entity/9").unwrap()["ok"], true);
        assert_eq!(*script.token_requests.borrow(), 2);
        assert_eq!(script.urls().len(), 2);
        assert_eq!(script.header(1, "Authorization").as_deref(), Some("Bearer fresh"));
    }

    #[test]
    fn second_unauthorized_is_not_retried_again() {
        let script = ScriptedTransport::default()
            .token("a")
            .token("b")
            .reply(401, "denied")
            .reply(401, "still denied");
        let mut client = ApiClient::with_transport(&script, &config());

        let value = client.call("/icd/entity/9").unwrap();
        assert_eq!(
            remote_error(&value),
            Some(RemoteError {
                status_code: 401,
                detail: "still denied".into()
            })
        );
        assert_eq!(script.urls().len(), 2);
    }

    #[test]
    fn rejected_credentials_are_a_token_error() {
        let script = ScriptedTransport::default();
        let mut client = ApiClient::with_transport(&script, &config());
        match client.call("/icd/entity") {
            Err(ApiError::Token { status, .. }) => assert_eq!(status, 400),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn release_placeholder_is_resolved_once() {
        let script = ScriptedTransport::default()
            .token("t")
            .reply(
                200,
                r#"{"latestRelease":"http://id.who.int/icd/release/11/2024-01/mms","release":[]}"#,
            )
            .reply(200, "{}")
            .reply(200, "{}");
        let mut client = ApiClient::with_transport(&script, &config());

        client.call("/icd/release/11/{release}/mms/codeinfo/1A00").unwrap();
        client.call("/icd/release/11/{release}/mms/search?q=x").unwrap();

        assert_eq!(
            script.urls(),
            vec![
                "https://id.who.int/icd/release/11/mms".to_string(),
                "https://id.who.int/icd/release/11/2024-01/mms/codeinfo/1A00".to_string(),
                "https://id.who.int/icd/release/11/2024-01/mms/search?q=x".to_string(),
            ]
        );
    }

    #[test]
    fn pinned_release_skips_the_lookup() {
        let mut cfg = config();
        cfg.release = Some("2023-01".into());
        let script = ScriptedTransport::default().token("t").reply(200, "{}");
        let mut client = ApiClient::with_transport(&script, &cfg);

        client.call("/icd/release/11/{release}/mms").unwrap();
        assert_eq!(
            script.urls(),
            vec!["https://id.who.int/icd/release/11/2023-01/mms".to_string()]
        );
    }

    #[test]
    fn non_json_and_error_statuses_become_error_objects() {
        let script = ScriptedTransport::default()
            .token("t")
            .reply(200, "<html>maintenance</html>")
            .reply(404, "Not found\n");
        let mut client = ApiClient::with_transport(&script, &config());

        let first = client.call("/a").unwrap();
        assert_eq!(first["error"]["status_code"], 200);
        assert_eq!(first["error"]["detail"], "<html>maintenance</html>");

        let second = remote_error(&client.call("/b").unwrap()).unwrap();
        assert_eq!(second.status_code, 404);
        assert_eq!(second.detail, "Not found");
    }

    #[test]
    fn plain_values_are_not_errors() {
        assert_eq!(remote_error(&json!({"title": "x"})), None);
    }

    #[test]
    fn search_success_flag_is_not_an_error() {
        let body = json!({"error": false, "errorMessage": null, "destinationEntities": []});
        assert_eq!(remote_error(&body), None);
    }

    #[test]
    fn urls_are_resolved_against_the_api_base() {
        assert_eq!(resolve_url("/icd/entity/1"), "https://id.who.int/icd/entity/1");
        assert_eq!(resolve_url("icd/entity/1"), "https://id.who.int/icd/entity/1");
        assert_eq!(
            resolve_url("http://id.who.int/icd/entity/1"),
            "https://id.who.int/icd/entity/1"
        );
        assert_eq!(resolve_url("https://example.org/x"), "https://example.org/x");
    }

    #[test]
    fn release_ids_are_read_from_release_uris() {
        assert_eq!(
            extract_release_id("http://id.who.int/icd/release/11/2024-01/mms").as_deref(),
            Some("2024-01")
        );
        assert_eq!(
            extract_release_id("https://id.who.int/icd/release/11/2019-04/mms/").as_deref(),
            Some("2019-04")
        );
        assert_eq!(extract_release_id("http://id.who.int/icd/release/11/mms"), None);
        assert_eq!(extract_release_id("not a uri"), None);
    }

    #[test]
    fn query_values_are_escaped() {
        assert_eq!(query_escape("heart attack & stroke"), "heart+attack+%26+stroke");
    }
}
