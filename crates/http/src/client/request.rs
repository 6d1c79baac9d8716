//! Request description handed to [`ApiClient::execute`](super::ApiClient::execute)

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use super::error::ApiError;

/// Per-call behavior flags
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Do not attach the stored access token
    pub skip_auth: bool,
    /// Refresh the session and retry once on 401
    pub retry_on_unauthorized: bool,
    /// Extra headers merged over the defaults
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            skip_auth: false,
            retry_on_unauthorized: true,
            headers: HeaderMap::new(),
        }
    }
}

impl RequestOptions {
    /// Options for endpoints that must not carry credentials
    #[must_use]
    pub fn public() -> Self {
        Self {
            skip_auth: true,
            ..Self::default()
        }
    }
}

/// One logical API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub options: RequestOptions,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns an `ApiError` with status 0 if `body` cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::new(format!("Failed to encode request body: {e}"), 0))?;
        self.body = Some(value);
        Ok(self)
    }

    #[must_use]
    pub fn skip_auth(mut self) -> Self {
        self.options.skip_auth = true;
        self
    }

    #[must_use]
    pub const fn retry_on_unauthorized(mut self, retry: bool) -> Self {
        self.options.retry_on_unauthorized = retry;
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.options.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_attach_auth_and_retry() {
        let options = RequestOptions::default();
        assert!(!options.skip_auth);
        assert!(options.retry_on_unauthorized);
        assert!(RequestOptions::public().skip_auth);
    }

    #[test]
    fn builder_sets_body_and_flags() {
        let request = ApiRequest::post("/tasks")
            .json(&json!({"title": "Write"}))
            .unwrap()
            .skip_auth()
            .retry_on_unauthorized(false);
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Some(json!({"title": "Write"})));
        assert!(request.options.skip_auth);
        assert!(!request.options.retry_on_unauthorized);
    }
}
