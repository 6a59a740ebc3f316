//! crates/document_browser_core/src/oauth/controller.rs
//!
//! The authorization-code flow shared by every provider:
//!
//! 1. `begin_login` records a fresh CSRF state and returns the provider URL.
//! 2. `complete_login` consumes that state, redeems the code, reads the profile,
//!    upserts the user and issues a session.
//! 3. `logout` revokes the session.
//!
//! The state is consumed before anything else is checked, so a callback URL can
//! never be replayed, whether the first attempt succeeded or not.

use chrono::Duration;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::domain::{AuthenticatedUser, OAuthProfile, PendingLogin};
use crate::oauth::provider::{primary_verified_email, ProviderConfig, ProviderKind};
use crate::ports::{DatabaseService, OAuthHttpClient, PendingLoginStore, PortError, TokenRequest};
use crate::session::SessionStore;
use crate::token::generate_token;

/// How long a started login may wait for its callback.
pub const PENDING_LOGIN_TTL_MINUTES: i64 = 10;

/// Path under the redirect base at which provider callbacks arrive.
pub const CALLBACK_PATH: &str = "/auth/callback";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("OAuth configuration error: {0}")]
    Configuration(String),
    #[error("OAuth state did not match a pending login")]
    CsrfMismatch,
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Email {0} is already registered through another login")]
    EmailConflict(String),
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}

/// Where to send the browser to start a login.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub provider: ProviderKind,
    pub url: String,
    pub state: String,
}

pub struct OAuthController {
    providers: BTreeMap<ProviderKind, ProviderConfig>,
    redirect_base: String,
    pending: Arc<dyn PendingLoginStore>,
    http: Arc<dyn OAuthHttpClient>,
    db: Arc<dyn DatabaseService>,
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
}

impl OAuthController {
    /// Builds the controller from the configured providers.
    ///
    /// Incomplete provider configs are left out; ending up with none is an error.
    pub fn new(
        providers: Vec<ProviderConfig>,
        redirect_base: &str,
        pending: Arc<dyn PendingLoginStore>,
        http: Arc<dyn OAuthHttpClient>,
        db: Arc<dyn DatabaseService>,
        sessions: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let providers: BTreeMap<_, _> = providers
            .into_iter()
            .filter(ProviderConfig::is_complete)
            .map(|config| (config.kind, config))
            .collect();

        if providers.is_empty() {
            return Err(AuthError::Configuration(
                "no OAuth provider is configured".to_string(),
            ));
        }

        Ok(Self {
            providers,
            redirect_base: redirect_base.trim_end_matches('/').to_string(),
            pending,
            http,
            db,
            sessions,
            clock,
        })
    }

    /// The selectable providers, in a fixed order.
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }

    /// The exact redirect URI registered with `provider`.
    pub fn redirect_uri(&self, provider: ProviderKind) -> String {
        format!("{}{}/{}", self.redirect_base, CALLBACK_PATH, provider.as_str())
    }

    pub async fn begin_login(&self, provider_id: &str) -> Result<LoginRedirect, AuthError> {
        let config = self.provider_config(provider_id)?;
        let now = self.clock.now();

        // 1. Sweep abandoned logins so the store stays bounded.
        let cutoff = now - Duration::minutes(PENDING_LOGIN_TTL_MINUTES);
        self.pending.purge_created_before(cutoff).await?;

        // 2. Build the provider URL around a fresh state.
        let state = generate_token();
        let redirect_uri = self.redirect_uri(config.kind);
        let url = config
            .capability()
            .authorization_url(&config.client_id, &redirect_uri, &state)
            .map_err(|e| AuthError::Configuration(format!("invalid authorization endpoint: {e}")))?;

        // 3. Remember the transaction before handing the URL out.
        self.pending
            .save(PendingLogin {
                state: state.clone(),
                provider: config.kind,
                redirect_uri,
                created_at: now,
            })
            .await?;

        info!(provider = %config.kind, state = state_prefix(&state), "Login started");
        Ok(LoginRedirect {
            provider: config.kind,
            url: url.into(),
            state,
        })
    }

    pub async fn complete_login(
        &self,
        provider_id: &str,
        returned_state: &str,
        authorization_code: &str,
    ) -> Result<AuthenticatedUser, AuthError> {
        // 1. Consume the pending transaction. From here on the state is spent.
        let pending = self.take_pending(returned_state).await?;
        let provider = provider_id.parse::<ProviderKind>().ok();
        if provider != Some(pending.provider) {
            warn!(
                expected = %pending.provider,
                received = provider_id,
                "Callback provider does not match the pending login"
            );
            return Err(AuthError::CsrfMismatch);
        }
        if authorization_code.trim().is_empty() {
            return Err(AuthError::TokenExchange(
                "callback carried no authorization code".to_string(),
            ));
        }
        let config = self.provider_config(pending.provider.as_str())?;
        let capability = config.capability();

        // 2. Redeem the code for an access token.
        let access_token = self
            .http
            .exchange_code(TokenRequest {
                token_url: &capability.token_endpoint,
                client_id: &config.client_id,
                client_secret: &config.client_secret,
                code: authorization_code,
                redirect_uri: &pending.redirect_uri,
            })
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        // 3. Trade the access token for profile claims.
        let profile = self.fetch_profile(config, &access_token).await?;

        // 4. Upsert the user and issue a session.
        let now = self.clock.now();
        let user = self
            .db
            .upsert_oauth_user(&profile, now)
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => AuthError::EmailConflict(profile.email.clone()),
                other => AuthError::Port(other),
            })?;
        let session = self.sessions.issue(&user).await?;

        info!(provider = %profile.provider, user_id = %user.id, "Login completed");
        Ok(AuthenticatedUser {
            user,
            session_token: session.token,
            expires_at: session.expires_at,
        })
    }

    /// Discards the pending login for `state`, used when the provider reports an error.
    pub async fn abandon_login(&self, state: &str) -> Result<(), AuthError> {
        if let Some(pending) = self.pending.take(state).await? {
            info!(provider = %pending.provider, state = state_prefix(state), "Login abandoned");
        }
        Ok(())
    }

    /// Revokes the session. Unknown or already revoked tokens are fine.
    pub async fn logout(&self, session_token: &str) -> Result<(), AuthError> {
        self.sessions.revoke(session_token).await?;
        Ok(())
    }

    fn provider_config(&self, provider_id: &str) -> Result<&ProviderConfig, AuthError> {
        let kind = provider_id
            .parse::<ProviderKind>()
            .map_err(|e| AuthError::Configuration(e.to_string()))?;
        self.providers.get(&kind).ok_or_else(|| {
            AuthError::Configuration(format!("provider '{kind}' is not configured"))
        })
    }

    async fn take_pending(&self, returned_state: &str) -> Result<PendingLogin, AuthError> {
        if returned_state.is_empty() {
            return Err(AuthError::CsrfMismatch);
        }
        let pending = self
            .pending
            .take(returned_state)
            .await?
            .ok_or(AuthError::CsrfMismatch)?;

        let age = self.clock.now() - pending.created_at;
        if age > Duration::minutes(PENDING_LOGIN_TTL_MINUTES) {
            warn!(provider = %pending.provider, "Pending login expired before its callback");
            return Err(AuthError::CsrfMismatch);
        }
        Ok(pending)
    }

    async fn fetch_profile(
        &self,
        config: &ProviderConfig,
        access_token: &str,
    ) -> Result<OAuthProfile, AuthError> {
        let capability = config.capability();
        let claims = self
            .http
            .fetch_json(capability.profile_endpoint, access_token)
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let fallback_email = match capability.email_endpoint {
            Some(endpoint) if !capability.claims.has_email(&claims) => {
                let listing = self
                    .http
                    .fetch_json(endpoint, access_token)
                    .await
                    .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
                primary_verified_email(&listing)
            }
            _ => None,
        };

        capability
            .claims
            .extract(config.kind, &claims, fallback_email)
            .map_err(|e| AuthError::TokenExchange(e.to_string()))
    }
}

/// Enough of a state value to correlate log lines without making it usable.
fn state_prefix(state: &str) -> &str {
    state.get(..6).unwrap_or(state)
}
