//! HTTP client implementation

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use api_models::models::ErrorResponse;

use crate::errors::DeployError;

/// Connection options for one REST API
#[derive(Debug)]
pub struct ApiOptions {
    /// Base URL, path segments are appended to it
    pub base_url: String,

    /// Basic auth user
    pub user: String,

    /// Basic auth password
    pub password: SecretString,

    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,

    /// Request timeout
    pub timeout: Duration,
}

impl ApiOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user: String::new(),
            password: SecretString::from(String::new()),
            accept_invalid_certs: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client with basic auth against one base URL
pub struct HttpClient {
    client: Client,
    base_url: Url,
    user: String,
    password: SecretString,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(options: &ApiOptions) -> Result<Self, DeployError> {
        let base_url = Url::parse(&options.base_url).map_err(|e| {
            DeployError::ConfigError(format!("Invalid base URL {}: {}", options.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(DeployError::ConfigError(format!(
                "Invalid base URL {}",
                options.base_url
            )));
        }

        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url,
            user: options.user.clone(),
            password: SecretString::from(options.password.expose_secret().to_string()),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL with the given path segments appended, each one percent-encoded
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        if self.user.is_empty() {
            None
        } else {
            Some((self.user.as_str(), self.password.expose_secret()))
        }
    }

    /// Make a GET request and decode a JSON body
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, DeployError> {
        let url = self.url(segments);
        debug!("GET {}", url);

        let mut request = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some((user, password)) = self.credentials() {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET failed: {} - {}", status, body);
            return Err(api_error(status, &body));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST a file as a multipart attachment and return the response body.
    ///
    /// Only `200 OK` counts as success.
    pub async fn post_file(
        &self,
        segments: &[&str],
        file_name: String,
        contents: Vec<u8>,
        headers: &[(&'static str, &'static str)],
    ) -> Result<String, DeployError> {
        let url = self.url(segments);
        debug!("POST {} ({})", url, file_name);

        let form = Form::new().part("file", Part::bytes(contents).file_name(file_name));
        let mut request = self.client.post(url).multipart(form);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some((user, password)) = self.credentials() {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP POST failed: {} - {}", status, body);
            return Err(api_error(status, &body));
        }

        Ok(response.text().await?)
    }
}

/// Prefer the message of a JSON error body over the raw text
fn api_error(status: StatusCode, body: &str) -> DeployError {
    let detail = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) if !err.message.is_empty() => err.message,
        Ok(err) if !err.error.is_empty() => err.error,
        _ => body.trim().to_string(),
    };
    DeployError::ApiError(format!("{}: {}", status, detail))
}
