//! Authentication API client methods

use super::{ApiClient, ApiError, ApiRequest};
use taskboard_core::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest, User,
};

impl ApiClient {
    /// Authenticate with email and password
    ///
    /// Credential failures are reported as-is rather than triggering a
    /// session refresh.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let req = ApiRequest::post("/auth/login")
            .json(request)?
            .skip_auth()
            .retry_on_unauthorized(false);
        self.execute(req).await
    }

    /// Register a new account
    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, ApiError> {
        let req = ApiRequest::post("/auth/signup")
            .json(request)?
            .skip_auth()
            .retry_on_unauthorized(false);
        self.execute(req).await
    }

    /// Tell the server the session is over
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.send(ApiRequest::post("/auth/logout")).await.map(|_| ())
    }

    /// Profile of the authenticated user
    pub async fn me(&self) -> Result<User, ApiError> {
        self.get("/auth/me").await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/forgot-password")
            .json(&ForgotPasswordRequest {
                email: email.to_string(),
            })?
            .skip_auth()
            .retry_on_unauthorized(false);
        self.send(req).await.map(|_| ())
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/reset-password")
            .json(&ResetPasswordRequest {
                token: token.to_string(),
                password: password.to_string(),
            })?
            .skip_auth()
            .retry_on_unauthorized(false);
        self.send(req).await.map(|_| ())
    }
}
