use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Access denied")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Invalid response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// HTTP client for the hosted backend (auth + REST).
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    base_url: String,
    api_key: String,
    client: Client,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ApiError> {
        // On wasm, we can't use timeout
        #[cfg(target_arch = "wasm32")]
        let client = Client::new();

        #[cfg(not(target_arch = "wasm32"))]
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(ApiClient {
            inner: Arc::new(ApiClientInner {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
                client,
                token: RwLock::new(None),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn set_token(&self, token: Option<String>) {
        let mut guard = self.inner.token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = token;
    }

    pub fn get_token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attach the project key and, when signed in, the bearer token.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.get_token().unwrap_or_else(|| self.inner.api_key.clone());
        request
            .header("apikey", &self.inner.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let request = self.authorize(self.inner.client.get(&url));

        let response = request.send().await?;
        handle_response(response).await
    }

    /// GET with URL-encoded query parameters.
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ApiError> {
        let response = self.query_request(path, query).send().await?;
        handle_response(response).await
    }

    pub(crate) fn query_request<Q: Serialize + ?Sized>(&self, path: &str, query: &Q) -> RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        self.authorize(self.inner.client.get(&url).query(query))
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let request = self.authorize(self.inner.client.post(&url).json(body));

        let response = request.send().await?;
        handle_response(response).await
    }

    pub async fn post_no_response(&self, path: &str) -> Result<(), ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let request = self.authorize(self.inner.client.post(&url));

        let response = request.send().await?;
        handle_empty_response(response).await
    }
}

async fn handle_empty_response(response: reqwest::Response) -> Result<(), ApiError> {
    let status = response.status();

    match status {
        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(()),
        _ => Err(error_for_status(status, response).await),
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();

    match status {
        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
            response.json::<T>().await.map_err(|e| ApiError::Parse(e.to_string()))
        }
        _ => Err(error_for_status(status, response).await),
    }
}

async fn error_for_status(status: StatusCode, response: reqwest::Response) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::NOT_FOUND => {
            let text = response.text().await.unwrap_or_default();
            ApiError::NotFound(text)
        }
        _ => {
            let text = response.text().await.unwrap_or_default();
            ApiError::Server(format!("{}: {}", status, text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:54321/", "anon").unwrap();
        assert_eq!(client.base_url(), "http://localhost:54321");
    }

    #[test]
    fn test_token_can_be_set_and_cleared() {
        let client = ApiClient::new("http://localhost:54321", "anon").unwrap();
        assert_eq!(client.get_token(), None);

        client.set_token(Some("abc".into()));
        assert_eq!(client.get_token().as_deref(), Some("abc"));

        client.set_token(None);
        assert_eq!(client.get_token(), None);
    }

    #[test]
    fn test_query_request_attaches_key_and_encoded_query() {
        let client = ApiClient::new("http://localhost:54321", "anon").unwrap();
        let request = client
            .query_request("/rest/v1/users", &[("email", "eq.a b")])
            .build()
            .unwrap();

        assert_eq!(request.url().as_str(), "http://localhost:54321/rest/v1/users?email=eq.a+b");
        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()["authorization"], "Bearer anon");
    }
}
