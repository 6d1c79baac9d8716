#![allow(dead_code)]

use base64::Engine as _;
use std::sync::{Arc, Mutex};
use taskboard_core::Session;
use taskboard_http::{ApiClient, Navigator};
use wiremock::MockServer;

/// Unsigned JWT whose `exp` is `secs` from now
pub fn jwt_expiring_in(secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + secs;
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = engine.encode(format!(r#"{{"sub":"user_1","exp":{exp}}}"#));
    let signature = engine.encode("fake_sig");
    format!("{header}.{payload}.{signature}")
}

/// Navigator that remembers every location it was sent to
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, location: &str) {
        self.visits.lock().unwrap().push(location.to_string());
    }
}

pub struct Harness {
    pub server: MockServer,
    pub client: ApiClient,
    pub session: Arc<Session>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let session = Arc::new(Session::in_memory());
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::builder()
            .base_url(server.uri())
            .session(session.clone())
            .navigator(navigator.clone())
            .build()
            .unwrap();
        Self {
            server,
            client,
            session,
            navigator,
        }
    }

    pub fn store_tokens(&self, access: &str, refresh: Option<&str>) {
        self.session.tokens().set_tokens(access, refresh).unwrap();
    }
}
