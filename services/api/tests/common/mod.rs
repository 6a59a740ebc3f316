//! Shared fixtures for the integration tests: an in-memory database, a scripted
//! OAuth provider and a hand-driven clock.

#![allow(dead_code)]

use api_lib::adapters::{catalog, DbAdapter};
use api_lib::config::Config;
use api_lib::web::state::AppState;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use document_browser_core::{
    InMemoryPendingLogins, ManualClock, OAuthHttpClient, PortError, PortResult, ProviderKind,
    TokenRequest,
};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const REDIRECT_BASE: &str = "http://localhost:3000";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

//=========================================================================================
// Scripted provider
//=========================================================================================

/// Answers token and profile requests from a script instead of the network.
#[derive(Default)]
pub struct FakeProvider {
    /// authorization code -> access token
    codes: Mutex<HashMap<String, String>>,
    /// (url, access token) -> JSON body
    documents: Mutex<HashMap<(String, String), Value>>,
    exchanges: AtomicUsize,
    last_redirect_uri: Mutex<Option<String>>,
}

impl FakeProvider {
    /// Scripts a successful login: `code` redeems to a token that reads `profile`.
    pub fn script(&self, provider: ProviderKind, code: &str, profile: Value) {
        let token = format!("access-{code}");
        let endpoint = provider.capability(Some("common")).profile_endpoint;
        self.codes.lock().unwrap().insert(code.to_string(), token.clone());
        self.documents
            .lock()
            .unwrap()
            .insert((endpoint.to_string(), token), profile);
    }

    /// Adds the `/user/emails` listing GitHub returns for `code`'s token.
    pub fn script_github_emails(&self, code: &str, listing: Value) {
        let endpoint = ProviderKind::GitHub
            .capability(None)
            .email_endpoint
            .unwrap();
        self.documents
            .lock()
            .unwrap()
            .insert((endpoint.to_string(), format!("access-{code}")), listing);
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn last_redirect_uri(&self) -> Option<String> {
        self.last_redirect_uri.lock().unwrap().clone()
    }
}

#[async_trait]
impl OAuthHttpClient for FakeProvider {
    async fn exchange_code(&self, request: TokenRequest<'_>) -> PortResult<String> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        *self.last_redirect_uri.lock().unwrap() = Some(request.redirect_uri.to_string());
        self.codes
            .lock()
            .unwrap()
            .get(request.code)
            .cloned()
            .ok_or_else(|| PortError::Unexpected("invalid_grant".to_string()))
    }

    async fn fetch_json(&self, url: &str, access_token: &str) -> PortResult<Value> {
        self.documents
            .lock()
            .unwrap()
            .get(&(url.to_string(), access_token.to_string()))
            .cloned()
            .ok_or_else(|| PortError::Unexpected(format!("{url} answered with status 401")))
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct Harness {
    pub db: Arc<DbAdapter>,
    /// Same database as `db`, for arranging rows the ports do not expose.
    pub pool: SqlitePool,
    pub clock: Arc<ManualClock>,
    pub provider: Arc<FakeProvider>,
    pub state: Arc<AppState>,
    _documents: TempDir,
}

pub async fn in_memory_pool() -> SqlitePool {
    // One connection that never idles out, or the in-memory database vanishes.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    DbAdapter::new(pool.clone()).run_migrations().await.unwrap();
    pool
}

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

pub fn test_config(documents_path: &Path) -> Config {
    let vars: HashMap<&str, String> = [
        ("GOOGLE_CLIENT_ID", "google-id"),
        ("GOOGLE_CLIENT_SECRET", "google-secret"),
        ("MICROSOFT_CLIENT_ID", "ms-id"),
        ("MICROSOFT_CLIENT_SECRET", "ms-secret"),
        ("GITHUB_CLIENT_ID", "gh-id"),
        ("GITHUB_CLIENT_SECRET", "gh-secret"),
        ("OAUTH_REDIRECT_BASE", REDIRECT_BASE),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_string()))
    .chain([("DOCUMENTS_PATH", documents_path.display().to_string())])
    .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

impl Harness {
    /// A full application with every provider configured and a two-document catalog.
    pub async fn new() -> Self {
        let documents = tempfile::tempdir().unwrap();
        write(
            documents.path(),
            catalog::METADATA_FILE,
            br#"{"documents": [
                {"name": "Handbook", "date": "2024-05-01", "description": "Team handbook"},
                {"name": "Handbook", "date": "2024-01-10"},
                {"name": "Roadmap", "date": "2024-03-15"}
            ]}"#,
        );
        write(documents.path(), "content/Handbook_2024-05-01.html", b"<h1 id=\"intro\">Welcome</h1>");
        write(documents.path(), "content/Handbook_2024-01-10.html", b"<h1>Old welcome</h1>");
        write(documents.path(), "content/Roadmap_2024-03-15.pdf", b"%PDF-1.4 roadmap");

        let pool = in_memory_pool().await;
        let db = Arc::new(DbAdapter::new(pool.clone()));
        let clock = Arc::new(ManualClock::new(start_time()));
        let provider = Arc::new(FakeProvider::default());
        let config = Arc::new(test_config(documents.path()));
        let registry = catalog::load_registry(&config.documents_path, db.as_ref())
            .await
            .unwrap();

        let state = AppState::new(
            config,
            db.clone(),
            provider.clone(),
            Arc::new(InMemoryPendingLogins::new()),
            clock.clone(),
            registry,
        )
        .unwrap();

        Self {
            db,
            pool,
            clock,
            provider,
            state: Arc::new(state),
            _documents: documents,
        }
    }

    /// Runs a complete login for `code`, which must already be scripted.
    pub async fn login(&self, provider: ProviderKind, code: &str) -> document_browser_core::AuthenticatedUser {
        let redirect = self.state.oauth.begin_login(provider.as_str()).await.unwrap();
        self.state
            .oauth
            .complete_login(provider.as_str(), &redirect.state, code)
            .await
            .unwrap()
    }
}

/// Number of user rows, for asserting that a failed login left nothing behind.
pub async fn user_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .unwrap()
}

pub fn google_profile(sub: &str, email: &str, name: &str) -> Value {
    serde_json::json!({
        "id": sub,
        "email": email,
        "verified_email": true,
        "name": name,
        "picture": format!("https://lh3.example.com/{sub}.png"),
    })
}
