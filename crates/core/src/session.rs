//! Authenticated session: tokens plus the cached user profile

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::CoreResult;
use crate::storage::{MemoryStore, SessionStore};
use crate::token::{TokenStorage, USER_KEY, is_token_expired};
use crate::types::{AuthResponse, User};

/// Session state shared by the API client and the auth service.
///
/// The user profile is held in memory and mirrored to the store under
/// [`USER_KEY`]. Clearing the session drops both tokens and the user.
///
/// Every login and every clear advances the session [`epoch`](Self::epoch),
/// so data fetched on behalf of one user can be told apart from the next.
pub struct Session {
    tokens: TokenStorage,
    user: RwLock<Option<User>>,
    epoch: AtomicU64,
}

impl Session {
    /// Create a session over `store`, restoring any cached user.
    ///
    /// A cached user that fails to decode is removed from the store.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let tokens = TokenStorage::new(store);
        let user = load_cached_user(&tokens);
        Self {
            tokens,
            user: RwLock::new(user),
            epoch: AtomicU64::new(0),
        }
    }

    /// Session backed by a fresh [`MemoryStore`]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenStorage {
        &self.tokens
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        match self.user.read() {
            Ok(user) => user.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Cache `user` in memory and persist it
    pub fn set_user(&self, user: User) -> CoreResult<()> {
        let serialized = serde_json::to_string(&user)?;
        self.replace_user(Some(user));
        self.tokens.store().set(USER_KEY, &serialized)
    }

    /// Counter advanced whenever the session starts or ends
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Record a successful login or signup
    pub fn begin(&self, auth: &AuthResponse) -> CoreResult<()> {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.tokens
            .set_tokens(&auth.access_token, auth.refresh_token.as_deref())?;
        self.set_user(auth.user.clone())
    }

    /// Drop the cached user and all stored tokens
    pub fn clear(&self) -> CoreResult<()> {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.replace_user(None);
        self.tokens.clear_tokens()
    }

    /// Check for a stored access token that has not expired
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens
            .access_token()
            .is_some_and(|token| !is_token_expired(&token))
    }

    fn replace_user(&self, user: Option<User>) {
        match self.user.write() {
            Ok(mut guard) => *guard = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user())
            .finish_non_exhaustive()
    }
}

fn load_cached_user(tokens: &TokenStorage) -> Option<User> {
    let raw = match tokens.store().get(USER_KEY) {
        Ok(raw) => raw?,
        Err(error) => {
            tracing::warn!(%error, "failed to read cached user");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(user) => Some(user),
        Err(error) => {
            tracing::warn!(%error, "discarding corrupt cached user");
            if let Err(error) = tokens.store().remove(USER_KEY) {
                tracing::warn!(%error, "failed to remove corrupt cached user");
            }
            None
        }
    }
}
