//! Authentication service owning the client session

use std::sync::Arc;
use taskboard_core::{
    AuthResponse, CoreError, LoginRequest, Session, SignupRequest, User, is_token_expired,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{ApiClient, ApiError};

/// Failure of a login or signup
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server rejected the request or could not be reached
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The server accepted the credentials but the session was not stored
    #[error("failed to save session: {0}")]
    Session(#[from] CoreError),
}

impl AuthError {
    #[must_use]
    pub const fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(error) => Some(error),
            Self::Session(_) => None,
        }
    }
}

/// Login, signup, logout and current-user resolution over one [`Session`].
///
/// The service is the single owner of session mutations made on behalf of
/// the user; the client only clears the session when a refresh fails.
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        self.client.session()
    }

    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<AuthResponse, AuthError> {
        let request = LoginRequest {
            email: email.into().trim().to_string(),
            password: password.into(),
        };
        let response = self.client.login(&request).await?;
        self.begin_session(&response)?;
        info!(user_id = %response.user.id, "logged in");
        Ok(response)
    }

    pub async fn signup(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<AuthResponse, AuthError> {
        let request = SignupRequest {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            password: password.into(),
        };
        let response = self.client.signup(&request).await?;
        self.begin_session(&response)?;
        info!(user_id = %response.user.id, "signed up");
        Ok(response)
    }

    /// Notify the server and clear local state; server errors are ignored
    pub async fn logout(&self) {
        if let Err(error) = self.client.logout().await {
            warn!(%error, status = error.status, "logout request failed; clearing local session anyway");
        }
        self.clear_session();
        info!("logged out");
    }

    /// Resolve the signed-in user.
    ///
    /// Returns `Ok(None)` when no token is stored, when the stored token has
    /// expired, or when the server rejects the session; in the last two cases
    /// the session is cleared. Network and server failures are returned as
    /// errors rather than read as "signed out", so a flaky connection does not
    /// look like a logout.
    pub async fn current_user(&self) -> Result<Option<User>, ApiError> {
        let Some(token) = self.session().tokens().access_token() else {
            return Ok(None);
        };

        if is_token_expired(&token) {
            self.clear_session();
            return Ok(None);
        }

        if let Some(user) = self.session().user() {
            return Ok(Some(user));
        }

        match self.client.me().await {
            Ok(user) => {
                if let Err(error) = self.session().set_user(user.clone()) {
                    warn!(%error, "failed to cache user profile");
                }
                Ok(Some(user))
            }
            Err(error) if error.is_unauthorized() => {
                self.clear_session();
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        self.client.forgot_password(email.trim()).await
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), ApiError> {
        self.client.reset_password(token, password).await
    }

    /// Check for an unexpired access token without contacting the server
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    /// Cached user, if any
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.session().user()
    }

    /// Store the new session; a partial write is rolled back
    fn begin_session(&self, response: &AuthResponse) -> Result<(), CoreError> {
        self.session().begin(response).inspect_err(|error| {
            warn!(%error, "failed to persist session");
            self.clear_session();
        })
    }

    fn clear_session(&self) {
        if let Err(error) = self.session().clear() {
            warn!(%error, "failed to clear session");
        }
    }
}
