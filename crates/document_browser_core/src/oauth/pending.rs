//! crates/document_browser_core/src/oauth/pending.rs
//!
//! Process-local `PendingLoginStore`. One instance is created at startup and handed
//! to the controller; it is dropped, with whatever it still holds, at shutdown.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::PendingLogin;
use crate::ports::{PendingLoginStore, PortResult};

#[derive(Debug, Default)]
pub struct InMemoryPendingLogins {
    by_state: Mutex<HashMap<String, PendingLogin>>,
}

impl InMemoryPendingLogins {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.by_state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PendingLoginStore for InMemoryPendingLogins {
    async fn save(&self, pending: PendingLogin) -> PortResult<()> {
        self.by_state
            .lock()
            .await
            .insert(pending.state.clone(), pending);
        Ok(())
    }

    async fn take(&self, state: &str) -> PortResult<Option<PendingLogin>> {
        Ok(self.by_state.lock().await.remove(state))
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> PortResult<usize> {
        let mut by_state = self.by_state.lock().await;
        let before = by_state.len();
        by_state.retain(|_, pending| pending.created_at >= cutoff);
        Ok(before - by_state.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::ProviderKind;
    use chrono::Duration;

    fn pending(state: &str, created_at: DateTime<Utc>) -> PendingLogin {
        PendingLogin {
            state: state.to_string(),
            provider: ProviderKind::Google,
            redirect_uri: "http://localhost:3000/auth/callback/google".to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn take_is_single_use() {
        let store = InMemoryPendingLogins::new();
        store.save(pending("abc", Utc::now())).await.unwrap();

        let first = store.take("abc").await.unwrap();
        assert_eq!(first.map(|p| p.state), Some("abc".to_string()));
        assert!(store.take("abc").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_state_yields_nothing() {
        let store = InMemoryPendingLogins::new();
        store.save(pending("abc", Utc::now())).await.unwrap();

        assert!(store.take("abd").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn purge_drops_only_stale_entries() {
        let now = Utc::now();
        let store = InMemoryPendingLogins::new();
        store.save(pending("old", now - Duration::minutes(30))).await.unwrap();
        store.save(pending("fresh", now)).await.unwrap();

        let dropped = store
            .purge_created_before(now - Duration::minutes(10))
            .await
            .unwrap();

        assert_eq!(dropped, 1);
        assert!(store.take("old").await.unwrap().is_none());
        assert!(store.take("fresh").await.unwrap().is_some());
    }
}
