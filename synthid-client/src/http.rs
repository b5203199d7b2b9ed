use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{envelope_message, ApiError};

/// Method, body, headers and query for one call. Defaults to a bare GET.
#[derive(Clone, Debug)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: HeaderMap,
    pub query: Vec<(&'static str, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            query: Vec::new(),
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::default()
        }
    }

    pub fn post<B: Serialize>(body: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(format!("cannot encode body: {e}")))?;
        Ok(Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        })
    }

    pub fn query(mut self, pairs: Vec<(&'static str, String)>) -> Self {
        self.query = pairs;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Thin JSON wrapper over `reqwest`: relative paths, JSON by default, error envelopes unwrapped.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Issue the request and return the parsed JSON body (`null` for an empty 2xx body).
    pub async fn send(&self, path: &str, opts: RequestOptions) -> Result<Value, ApiError> {
        let url = self.url(path);
        let method = opts.method.clone();
        debug!(%method, %url, "api request");

        let result = self.execute(&url, opts).await;
        if let Err(e) = &result {
            error!(%method, %url, error = %e, "API request failed");
        }
        result
    }

    pub async fn request<T: DeserializeOwned>(&self, path: &str, opts: RequestOptions) -> Result<T, ApiError> {
        let value = self.send(path, opts).await?;
        serde_json::from_value(value).map_err(|e| {
            error!(path, error = %e, "API response did not match the expected shape");
            ApiError::Decode(e.to_string())
        })
    }

    async fn execute(&self, url: &str, opts: RequestOptions) -> Result<Value, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in opts.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let mut builder = self.client.request(opts.method, url).headers(headers);
        if !opts.query.is_empty() {
            builder = builder.query(&opts.query);
        }
        if let Some(body) = &opts.body {
            let bytes = serde_json::to_vec(body).map_err(|e| ApiError::Decode(format!("cannot encode body: {e}")))?;
            builder = builder.body(bytes);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: envelope_message(status.as_u16(), &bytes),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
