//! Scripted API and captured output for handler tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;

use icd_api::{ApiClient, ApiError, HttpResponse, Transport};
use icd_config::Config;
use icd_core::{Args, Value};

use crate::session::Session;

/// Canned API responses, played back in order. Tokens are always granted.
#[derive(Default)]
pub struct Script {
    replies: RefCell<VecDeque<HttpResponse>>,
    urls: RefCell<Vec<String>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: &str) -> Self {
        self.replies.borrow_mut().push_back(HttpResponse::new(status, body));
        self
    }
}

impl Transport for &Script {
    fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse, ApiError> {
        self.urls.borrow_mut().push(url.to_string());
        Ok(self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| HttpResponse::new(500, "script exhausted")))
    }

    fn post_form(&self, _url: &str, _form: &[(&str, &str)]) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse::new(200, r#"{"access_token":"t"}"#))
    }
}

#[derive(Clone, Default)]
pub struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Session over `script`, pinned to release `2024-01`.
pub fn session(script: &Script) -> (Session<&Script>, Captured) {
    let mut config = Config::new("id", "secret");
    config.release = Some("2024-01".into());
    let captured = Captured::default();
    let session = Session::with_client(ApiClient::with_transport(script, &config), Box::new(captured.clone()));
    (session, captured)
}

/// Run one handler; returns its result, its output and the URLs it requested.
pub fn run<'a>(
    script: &'a Script,
    handler: fn(&mut Session<&'a Script>, &Args) -> anyhow::Result<()>,
    args: Args,
) -> (anyhow::Result<()>, String, Vec<String>) {
    let (mut session, captured) = session(script);
    let result = handler(&mut session, &args);
    let urls = script.urls.borrow().clone();
    (result, captured.text(), urls)
}

pub fn texts(values: &[&str]) -> Args {
    Args::new(values.iter().map(|v| Value::Text(v.to_string())).collect())
}

pub fn list(values: &[&str]) -> Args {
    Args::new(vec![Value::List(
        values.iter().map(|v| Value::Text(v.to_string())).collect(),
    )])
}
