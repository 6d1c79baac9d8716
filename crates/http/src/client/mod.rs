//! Authenticated Taskboard API client
//!
//! Every call goes through [`ApiClient::execute`], which attaches the stored
//! bearer token, normalizes failures into [`ApiError`], and on a 401 refreshes
//! the session and retries the call at most once.

pub mod auth;
pub mod error;
pub mod navigator;
pub mod projects;
mod refresh;
pub mod request;
pub mod tasks;

pub use error::{ApiError, BuildError, ErrorKind};
pub use navigator::{Navigator, TracingNavigator};
pub use request::{ApiRequest, RequestOptions};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use taskboard_core::Session;
use tracing::{debug, warn};

use crate::config::{ClientConfig, DEFAULT_REFRESH_PATH, DEFAULT_SIGN_IN_PATH};

/// Taskboard API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    sign_in_path: String,
    refresh_path: String,
    session: Arc<Session>,
    navigator: Arc<dyn Navigator>,
    refresh: Arc<refresh::RefreshState>,
}

impl ApiClient {
    /// Create a client with an in-memory session and default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self, BuildError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Create a client from loaded configuration
    pub fn from_config(
        config: &ClientConfig,
        session: Arc<Session>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, BuildError> {
        let mut builder = Self::builder()
            .base_url(&config.base_url)
            .sign_in_path(&config.sign_in_path)
            .refresh_path(&config.refresh_path)
            .user_agent(&config.user_agent)
            .session(session)
            .navigator(navigator);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Session whose tokens this client attaches and refreshes
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Resolve `path` against the base URL; absolute URLs pass through
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Perform one logical call.
    ///
    /// A 401 on the first attempt (with retry enabled) triggers a single
    /// token refresh. If it succeeds the call is re-issued exactly once with
    /// retry disabled; if it fails the session is cleared, the navigator is
    /// sent to the sign-in path and the call fails with a session-expired
    /// error.
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        // Read before the token so a refresh finishing in between is noticed
        let refreshes_seen = self.refresh.completed();
        let token = self.bearer_token(&request);
        let reply = self.dispatch(&request, token.as_deref()).await?;
        if reply.status != StatusCode::UNAUTHORIZED || !request.options.retry_on_unauthorized {
            return reply.into_result();
        }

        debug!(path = %request.path, "unauthorized; refreshing session");
        if !self.refresh_session(refreshes_seen).await {
            return Err(ApiError::session_expired());
        }

        let retry = request.retry_on_unauthorized(false);
        let token = self.bearer_token(&retry);
        self.dispatch(&retry, token.as_deref()).await?.into_result()
    }

    /// Perform a call and return the raw JSON body (`None` for 204)
    pub async fn send(&self, request: ApiRequest) -> Result<Option<Value>, ApiError> {
        self.execute(request).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::delete(path)).await
    }

    fn bearer_token(&self, request: &ApiRequest) -> Option<String> {
        if request.options.skip_auth {
            None
        } else {
            self.session.tokens().access_token()
        }
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Reply, ApiError> {
        let url = self.url(&request.path);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        for (name, value) in &request.options.headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => warn!("stored access token is not a valid header value; omitting it"),
            }
        }

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        debug!(method = %request.method, %url, authenticated = token.is_some(), "sending request");
        let response = builder.send().await.map_err(|error| {
            warn!(%error, %url, "request could not be sent");
            ApiError::network()
        })?;
        Reply::read(response).await
    }

    fn expire_session(&self) {
        warn!("session refresh failed; clearing stored credentials");
        if let Err(error) = self.session.clear() {
            warn!(%error, "failed to clear session");
        }
        self.navigator.navigate(&self.sign_in_path);
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("sign_in_path", &self.sign_in_path)
            .field("refresh_path", &self.refresh_path)
            .finish_non_exhaustive()
    }
}

/// Status and decoded body of one HTTP exchange
struct Reply {
    status: StatusCode,
    /// `None` for 204 responses, whose body is never parsed
    body: Option<Value>,
}

impl Reply {
    async fn read(response: Response) -> Result<Self, ApiError> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Self { status, body: None });
        }

        let bytes = response.bytes().await.map_err(|error| {
            warn!(%error, %status, "failed to read response body");
            ApiError::network()
        })?;
        let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            debug!(%status, "response body is not JSON; using an empty object");
            Value::Object(serde_json::Map::new())
        });
        Ok(Self {
            status,
            body: Some(body),
        })
    }

    fn into_result<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let body = self.body.unwrap_or(Value::Null);
        if !self.status.is_success() {
            return Err(ApiError::from_response(self.status, &body));
        }
        serde_json::from_value(body).map_err(|error| {
            warn!(%error, status = %self.status, "response body did not match the expected type");
            ApiError::unexpected_response(self.status)
        })
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    sign_in_path: Option<String>,
    refresh_path: Option<String>,
    session: Option<Arc<Session>>,
    navigator: Option<Arc<dyn Navigator>>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    /// Set the base URL prefixed to relative paths
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Location handed to the navigator when the session expires
    pub fn sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = Some(path.into());
        self
    }

    /// Endpoint used to exchange the refresh token
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Share an existing session
    pub fn session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, BuildError> {
        let base_url = self.base_url.ok_or(BuildError::MissingBaseUrl)?;
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|source| BuildError::InvalidBaseUrl {
            url: base_url.clone(),
            source,
        })?;

        // Cookies ride along with bearer tokens on every call
        let mut client_builder = ClientBuilder::new().cookie_store(true);
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(crate::config::default_user_agent),
        );

        Ok(ApiClient {
            client: client_builder.build()?,
            base_url,
            sign_in_path: self
                .sign_in_path
                .unwrap_or_else(|| DEFAULT_SIGN_IN_PATH.to_string()),
            refresh_path: self
                .refresh_path
                .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string()),
            session: self
                .session
                .unwrap_or_else(|| Arc::new(Session::in_memory())),
            navigator: self
                .navigator
                .unwrap_or_else(|| Arc::new(TracingNavigator)),
            refresh: Arc::default(),
        })
    }
}
