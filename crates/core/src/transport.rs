//! HTTP transport.
//!
//! `Connection` only ever needs two operations: GET a JSON document and POST a JSON body for a
//! JSON reply. Keeping them behind [`Transport`] lets tests drive connections and fetchers with
//! canned payloads.

use crate::constants::API_KEY_HEADER;
use crate::profile::{AuthStrategy, BackendProfile};
use crate::secrets::{scoped_secret_path, SecretStore};
use crate::{CoreError, CoreResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::Url;

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a transport needs to authenticate requests to one backend.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pub headers: BTreeMap<String, String>,
    pub basic_auth: Option<BasicAuth>,
    pub ca_bundle: Option<PathBuf>,
}

impl std::fmt::Debug for RequestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header_names: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        f.debug_struct("RequestParams")
            .field("headers", &header_names)
            .field("basic_auth", &self.basic_auth)
            .field("ca_bundle", &self.ca_bundle)
            .finish()
    }
}

impl RequestParams {
    /// Resolve request parameters for a profile, reading credentials from the secret store.
    ///
    /// # Arguments
    ///
    /// * `profile` - Validated backend profile.
    /// * `secrets` - Store queried under `<user>/<vault path>`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Secret`] if a credential field cannot be read.
    pub fn resolve(profile: &BackendProfile, secrets: &dyn SecretStore) -> CoreResult<Self> {
        let mut params = RequestParams {
            headers: profile.headers().clone(),
            ..RequestParams::default()
        };

        match profile.auth() {
            AuthStrategy::None => {}
            AuthStrategy::Basic {
                vault_path,
                user_field,
                password_field,
            } => {
                let path = scoped_secret_path(secrets.user(), vault_path);
                params.basic_auth = Some(BasicAuth {
                    username: secrets.read_field(&path, user_field)?,
                    password: secrets.read_field(&path, password_field)?,
                });
            }
            AuthStrategy::Token {
                vault_path,
                key_field,
                cert_bundle,
            } => {
                let path = scoped_secret_path(secrets.user(), vault_path);
                let key = secrets.read_field(&path, key_field)?;
                params.headers.insert(API_KEY_HEADER.to_owned(), key);
                params.ca_bundle = Some(cert_bundle.clone());
            }
        }

        Ok(params)
    }
}

/// Blocking JSON transport.
pub trait Transport: Send + Sync {
    /// GET `url` and decode the body as JSON.
    fn get_json(&self, url: &Url) -> CoreResult<Value>;

    /// POST `body` as JSON to `url` and decode the reply as JSON.
    fn post_json(&self, url: &Url, body: &Value) -> CoreResult<Value>;
}

/// `reqwest`-backed transport.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    basic_auth: Option<BasicAuth>,
}

impl HttpTransport {
    /// Build a client carrying the profile's headers and, when configured, its pinned CA bundle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if a header is not valid HTTP or the bundle is not
    /// a PEM certificate, and [`CoreError::FileRead`] if the bundle cannot be read.
    pub fn new(params: &RequestParams) -> CoreResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &params.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                CoreError::Configuration(format!("invalid header name '{name}': {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                CoreError::Configuration(format!("invalid value for header '{name}': {e}"))
            })?;
            headers.insert(header_name, header_value);
        }

        let mut builder = reqwest::blocking::Client::builder().default_headers(headers);

        if let Some(bundle) = &params.ca_bundle {
            let pem = std::fs::read(bundle).map_err(|source| CoreError::FileRead {
                path: bundle.clone(),
                source,
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                CoreError::Configuration(format!(
                    "invalid certificate bundle {}: {e}",
                    bundle.display()
                ))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder.build().map_err(|e| {
            CoreError::Configuration(format!("failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            basic_auth: params.basic_auth.clone(),
        })
    }

    fn authorise(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.basic_auth {
            Some(auth) => request.basic_auth(&auth.username, Some(&auth.password)),
            None => request,
        }
    }

    fn handle_response(url: &Url, response: reqwest::blocking::Response) -> CoreResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CoreError::Transport {
                url: url.to_string(),
                message: format!("unexpected status {status}: {body}"),
            });
        }

        response
            .json::<Value>()
            .map_err(|e| CoreError::parse(format!("response from {url}"), e))
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> CoreError {
    CoreError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &Url) -> CoreResult<Value> {
        tracing::debug!("GET {}", url);
        let response = self
            .authorise(self.client.get(url.clone()))
            .send()
            .map_err(|e| transport_error(url, e))?;
        Self::handle_response(url, response)
    }

    fn post_json(&self, url: &Url, body: &Value) -> CoreResult<Value> {
        tracing::debug!("POST {}", url);
        let response = self
            .authorise(self.client.post(url.clone()))
            .json(body)
            .send()
            .map_err(|e| transport_error(url, e))?;
        Self::handle_response(url, response)
    }
}
