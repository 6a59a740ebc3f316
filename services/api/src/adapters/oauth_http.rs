//! services/api/src/adapters/oauth_http.rs
//!
//! The outbound half of the OAuth flow: redeeming an authorization code at a
//! provider's token endpoint and reading JSON profile documents with the
//! resulting bearer token.

use async_trait::async_trait;
use document_browser_core::ports::{OAuthHttpClient, PortError, PortResult, TokenRequest};
use oauth2::basic::BasicClient;
use oauth2::{AuthType, AuthorizationCode, ClientId, ClientSecret, RedirectUrl, TokenResponse, TokenUrl};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use tracing::warn;

const CLIENT_USER_AGENT: &str = "document-browser";

/// An adapter that implements the `OAuthHttpClient` port with `oauth2` and `reqwest`.
#[derive(Clone)]
pub struct ReqwestOAuthClient {
    http: Client,
}

impl ReqwestOAuthClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        // Token endpoints must never redirect; following one could leak the code.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl OAuthHttpClient for ReqwestOAuthClient {
    async fn exchange_code(&self, request: TokenRequest<'_>) -> PortResult<String> {
        let token_url = TokenUrl::new(request.token_url.to_string())
            .map_err(|e| PortError::Unexpected(format!("Invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(request.redirect_uri.to_string())
            .map_err(|e| PortError::Unexpected(format!("Invalid redirect URI: {}", e)))?;

        let client = BasicClient::new(ClientId::new(request.client_id.to_string()))
            .set_client_secret(ClientSecret::new(request.client_secret.to_string()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let token = client
            .exchange_code(AuthorizationCode::new(request.code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| {
                warn!("Token endpoint rejected the authorization code: {}", e);
                PortError::Unexpected(format!("Token exchange failed: {}", e))
            })?;

        Ok(token.access_token().secret().clone())
    }

    async fn fetch_json(&self, url: &str, access_token: &str) -> PortResult<serde_json::Value> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::Unexpected(format!(
                "{} answered with status {}",
                url, status
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid JSON from {}: {}", url, e)))
    }
}
