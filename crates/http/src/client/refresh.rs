//! Access token refresh

use std::sync::atomic::{AtomicU64, Ordering};
use taskboard_core::{RefreshRequest, RefreshResponse};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ApiClient;

/// Serializes refreshes and remembers how the last one ended
#[derive(Debug, Default)]
pub(crate) struct RefreshState {
    /// Whether the most recent refresh produced a new access token
    last_refreshed: Mutex<bool>,
    /// Refreshes completed so far; only advanced with `last_refreshed` held
    completed: AtomicU64,
}

impl RefreshState {
    pub(crate) fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }
}

impl ApiClient {
    /// Recover from a 401 on a request sent when `seen` refreshes had
    /// completed.
    ///
    /// Refreshes are serialized. A caller that waited while another refresh
    /// completed reuses its outcome instead of spending the refresh token
    /// again, and a failed refresh expires the session exactly once.
    pub(crate) async fn refresh_session(&self, seen: u64) -> bool {
        let mut last_refreshed = self.refresh.last_refreshed.lock().await;

        if self.refresh.completed() != seen {
            debug!(refreshed = *last_refreshed, "reusing outcome of a concurrent refresh");
            return *last_refreshed;
        }

        let refreshed = self.refresh_access_token().await;
        if !refreshed {
            self.expire_session();
        }
        *last_refreshed = refreshed;
        self.refresh.completed.fetch_add(1, Ordering::AcqRel);
        refreshed
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Returns `false` without raising when no refresh token is stored, the
    /// server rejects it, the response cannot be decoded, or the new tokens
    /// cannot be stored.
    pub async fn refresh_access_token(&self) -> bool {
        let Some(refresh_token) = self.session.tokens().refresh_token() else {
            debug!("no refresh token stored");
            return false;
        };

        let url = self.url(&self.refresh_path);
        let response = match self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, %url, "token refresh request failed");
                return false;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "token refresh rejected");
            return false;
        }

        let tokens: RefreshResponse = match response.json().await {
            Ok(tokens) => tokens,
            Err(error) => {
                warn!(%error, "token refresh response could not be decoded");
                return false;
            }
        };

        match self
            .session
            .tokens()
            .set_tokens(&tokens.access_token, tokens.refresh_token.as_deref())
        {
            Ok(()) => {
                info!("access token refreshed");
                true
            }
            Err(error) => {
                warn!(%error, "failed to store refreshed tokens");
                false
            }
        }
    }
}
