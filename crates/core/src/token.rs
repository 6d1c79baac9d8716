//! Access/refresh token persistence and expiry checks

use base64::Engine as _;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::storage::SessionStore;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

/// Tokens expiring within this window are treated as already expired
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Reads and writes session tokens in a [`SessionStore`]
#[derive(Clone)]
pub struct TokenStorage {
    store: Arc<dyn SessionStore>,
}

impl TokenStorage {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Store a new access token, and the refresh token when one is given.
    ///
    /// An absent refresh token leaves the stored one in place.
    pub fn set_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> CoreResult<()> {
        self.store.set(ACCESS_TOKEN_KEY, access_token)?;
        if let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) {
            self.store.set(REFRESH_TOKEN_KEY, refresh_token)?;
        }
        Ok(())
    }

    /// Remove both tokens and the cached user
    pub fn clear_tokens(&self) -> CoreResult<()> {
        // Attempt every key even if one fails
        let results = [
            self.store.remove(ACCESS_TOKEN_KEY),
            self.store.remove(REFRESH_TOKEN_KEY),
            self.store.remove(USER_KEY),
        ];
        results.into_iter().collect()
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(error) => {
                tracing::warn!(%error, key, "session store read failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for TokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStorage").finish_non_exhaustive()
    }
}

/// Decode the `exp` claim of a JWT without verifying its signature.
///
/// # Errors
///
/// Returns `CoreError::InvalidToken` if the token is not three dot-separated
/// segments, the payload is not base64url JSON, or `exp` is missing.
pub fn decode_expiry(token: &str) -> CoreResult<DateTime<Utc>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(CoreError::invalid_token("invalid JWT format"));
    }
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| CoreError::invalid_token(format!("base64 decode failed: {e}")))?;
    let value: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| CoreError::invalid_token(format!("JSON parse failed: {e}")))?;

    let exp_millis = match &value["exp"] {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|secs| secs.checked_mul(1000))
            .or_else(|| n.as_f64().map(|secs| (secs * 1000.0) as i64)),
        _ => None,
    }
    .ok_or_else(|| CoreError::invalid_token("missing exp claim"))?;

    DateTime::from_timestamp_millis(exp_millis)
        .ok_or_else(|| CoreError::invalid_token("invalid exp timestamp"))
}

/// Check whether a token is expired or expires within the safety buffer.
///
/// Tokens that cannot be decoded count as expired.
#[must_use]
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, Utc::now())
}

#[must_use]
pub fn is_token_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    decode_expiry(token).map_or(true, |expires_at| {
        now >= expires_at - TimeDelta::seconds(EXPIRY_BUFFER_SECS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

    const NOW: i64 = 1_700_000_000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).unwrap()
    }

    /// Unsigned token carrying `claims` as its payload
    fn token(claims: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.unsigned", URL_SAFE_NO_PAD.encode(claims))
    }

    fn expiring_at(exp: i64) -> String {
        token(&format!(r#"{{"sub":"u1","exp":{exp}}}"#))
    }

    fn storage() -> TokenStorage {
        TokenStorage::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn decode_expiry_reads_exp_claim() {
        let expires_at = decode_expiry(&expiring_at(NOW + 3600)).unwrap();
        assert_eq!(expires_at, now() + TimeDelta::hours(1));

        let fractional = decode_expiry(&token(r#"{"exp":1700000090.5}"#)).unwrap();
        assert_eq!(fractional.timestamp_millis(), 1_700_000_090_500);
    }

    #[test]
    fn decode_expiry_accepts_padded_payload() {
        let payload = URL_SAFE.encode(format!(r#"{{"sub":"u1","exp":{}}}"#, NOW + 3600));
        assert!(payload.ends_with('='));

        let expires_at = decode_expiry(&format!("h.{payload}.s")).unwrap();
        assert_eq!(expires_at.timestamp(), NOW + 3600);
    }

    #[test]
    fn decode_expiry_rejects_malformed_tokens() {
        let cases = [
            ("not-a-jwt".to_string(), "invalid JWT format"),
            ("a.b.c.d".to_string(), "invalid JWT format"),
            ("h.!!!.s".to_string(), "base64 decode failed"),
            (token("not json"), "JSON parse failed"),
            (token(r#"{"sub":"u1"}"#), "missing exp claim"),
            (token(r#"{"exp":"tomorrow"}"#), "missing exp claim"),
        ];

        for (input, expected) in cases {
            let error = decode_expiry(&input).unwrap_err();
            assert!(matches!(error, CoreError::InvalidToken { .. }), "{input}");
            assert!(error.to_string().contains(expected), "{input}: {error}");
        }
    }

    #[test]
    fn expiry_buffer_boundaries() {
        // (seconds until exp, treated as expired)
        let cases = [
            (-10, true),
            (0, true),
            (30, true),
            (EXPIRY_BUFFER_SECS, true),
            (EXPIRY_BUFFER_SECS + 1, false),
            (3600, false),
        ];

        for (remaining, expired) in cases {
            assert_eq!(
                is_token_expired_at(&expiring_at(NOW + remaining), now()),
                expired,
                "{remaining}s remaining"
            );
        }
    }

    #[test]
    fn undecodable_token_counts_as_expired() {
        for input in ["", "not-a-jwt", "a.b.c", token(r#"{"sub":"u1"}"#).as_str()] {
            assert!(is_token_expired_at(input, now()), "{input}");
        }
        assert!(!is_token_expired(&expiring_at(Utc::now().timestamp() + 3600)));
    }

    #[test]
    fn set_tokens_keeps_refresh_when_absent() {
        let tokens = storage();
        tokens.set_tokens("a1", Some("r1")).unwrap();
        tokens.set_tokens("a2", None).unwrap();
        tokens.set_tokens("a3", Some("")).unwrap();
        assert_eq!(tokens.access_token().as_deref(), Some("a3"));
        assert_eq!(tokens.refresh_token().as_deref(), Some("r1"));
    }

    #[test]
    fn clear_tokens_removes_user_too() {
        let tokens = storage();
        tokens.set_tokens("a1", Some("r1")).unwrap();
        tokens.store().set(USER_KEY, "{}").unwrap();

        tokens.clear_tokens().unwrap();

        assert!(tokens.access_token().is_none());
        assert!(tokens.refresh_token().is_none());
        assert_eq!(tokens.store().get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn empty_values_read_as_absent() {
        let tokens = storage();
        tokens.store().set(ACCESS_TOKEN_KEY, "").unwrap();
        assert!(tokens.access_token().is_none());
    }
}
