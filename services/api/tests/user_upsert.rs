//! Concurrent logins for one identity against a file-backed database with a real
//! connection pool.

use api_lib::adapters::DbAdapter;
use chrono::{Duration, TimeZone, Utc};
use document_browser_core::{DatabaseService, OAuthProfile, ProviderKind};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

const CONCURRENT_LOGINS: usize = 4;

async fn file_backed_db(dir: &tempfile::TempDir) -> (Arc<DbAdapter>, SqlitePool) {
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("users.db"))
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .unwrap();
    let db = DbAdapter::new(pool.clone());
    db.run_migrations().await.unwrap();
    (Arc::new(db), pool)
}

fn profile(subject: &str, name: &str) -> OAuthProfile {
    OAuthProfile {
        provider: ProviderKind::Google,
        subject: subject.to_string(),
        email: format!("{subject}@example.com"),
        name: name.to_string(),
        avatar_url: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_logins_for_one_identity_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let (db, pool) = file_backed_db(&dir).await;
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();

    for round in 0..30 {
        let subject = format!("g-{round}");
        // Every other round the user already exists, so the racers all take the update path.
        let existing = if round % 2 == 0 {
            Some(db.upsert_oauth_user(&profile(&subject, "Before"), now).await.unwrap())
        } else {
            None
        };

        let handles: Vec<_> = (0..CONCURRENT_LOGINS)
            .map(|i| {
                let db = db.clone();
                let profile = profile(&subject, &format!("Racer {i}"));
                let at = now + Duration::minutes(i as i64 + 1);
                tokio::spawn(async move { db.upsert_oauth_user(&profile, at).await })
            })
            .collect();

        let mut users = Vec::with_capacity(CONCURRENT_LOGINS);
        for handle in handles {
            users.push(handle.await.unwrap().unwrap());
        }

        let id = existing.as_ref().map_or(users[0].id, |u| u.id);
        assert!(users.iter().all(|u| u.id == id), "round {round} produced two users");
        assert!(users.iter().all(|u| u.email == format!("{subject}@example.com")));
        if let Some(existing) = existing {
            assert!(users.iter().all(|u| u.created_at == existing.created_at));
        }

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE oauth_subject = ?1")
            .bind(&subject)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}

#[tokio::test]
async fn a_returning_login_refreshes_profile_fields_but_keeps_the_email() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _pool) = file_backed_db(&dir).await;
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();

    let first = db.upsert_oauth_user(&profile("g-1", "Ada"), now).await.unwrap();

    let mut changed = profile("g-1", "Ada King");
    changed.email = "ada.king@example.com".to_string();
    changed.avatar_url = Some("https://lh3.example.com/ada.png".to_string());
    let later = now + Duration::hours(3);
    let second = db.upsert_oauth_user(&changed, later).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.email, "g-1@example.com");
    assert_eq!(second.name, "Ada King");
    assert_eq!(second.avatar_url.as_deref(), Some("https://lh3.example.com/ada.png"));
    assert_eq!(second.created_at, now);
    assert_eq!(second.last_login_at, Some(later));
    assert!(second.is_active);
}
