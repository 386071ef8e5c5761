//! Common utilities for NetBox API client
//!
//! Every request goes through [`HttpClient::request`], which attaches the token
//! and maps NetBox status codes onto [`NetBoxError`].

pub mod query;

use crate::error::NetBoxError;
pub use crate::models::PaginatedResponse;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP client wrapper with authentication
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path. Absolute URLs (pagination links) pass through.
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, NetBoxError> {
        let url = self.build_url(path);
        debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                NetBoxError::Authentication(format!("{} {}: {} - {}", method, path, status, text))
            }
            StatusCode::NOT_FOUND => {
                NetBoxError::NotFound(format!("Resource not found: {} - {}", path, text))
            }
            StatusCode::BAD_REQUEST => {
                NetBoxError::InvalidRequest(format!("{} {}: {}", method, path, text))
            }
            _ => NetBoxError::Api {
                status: status.as_u16(),
                message: format!("{} {}: {}", method, path, text),
            },
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, NetBoxError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            NetBoxError::Decode(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, NetBoxError> {
        Self::decode(self.request(Method::GET, path, None).await?).await
    }

    /// Make a POST request. Both 200 and 201 count as success.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, NetBoxError> {
        Self::decode(self.request(Method::POST, path, Some(body)).await?).await
    }

    /// Make a PATCH request
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, NetBoxError> {
        Self::decode(self.request(Method::PATCH, path, Some(body)).await?).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), NetBoxError> {
        self.request(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Fetch all pages of a paginated response
    pub async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        mut url: String,
    ) -> Result<Vec<T>, NetBoxError> {
        let mut all_results = Vec::new();

        loop {
            debug!("Fetching page: {}", url);
            let page: PaginatedResponse<T> = self.get(&url).await?;
            all_results.extend(page.results);

            match page.next {
                Some(next_url) => url = next_url,
                None => break,
            }
        }

        Ok(all_results)
    }

    /// Build query string from filters
    pub fn build_query_string(&self, filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
