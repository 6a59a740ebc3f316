//! crates/document_browser_core/src/oauth/provider.rs
//!
//! Per-provider capability records. Providers differ only in endpoints, scopes and
//! the field names of their profile claims; the login flow itself is shared and
//! lives in `controller.rs`.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::domain::OAuthProfile;

//=========================================================================================
// Provider Identity
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    Google,
    Microsoft,
    GitHub,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown OAuth provider '{0}'")]
pub struct UnknownProvider(pub String);

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Google,
        ProviderKind::Microsoft,
        ProviderKind::GitHub,
    ];

    /// The stable identifier used in URLs and in the `users.oauth_provider` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Microsoft => "microsoft",
            ProviderKind::GitHub => "github",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Google => "Google",
            ProviderKind::Microsoft => "Microsoft",
            ProviderKind::GitHub => "GitHub",
        }
    }

    /// Builds the capability record. `tenant` only affects Microsoft and defaults to `common`.
    pub fn capability(&self, tenant: Option<&str>) -> ProviderCapability {
        match self {
            ProviderKind::Google => ProviderCapability {
                authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
                profile_endpoint: "https://www.googleapis.com/oauth2/v2/userinfo",
                email_endpoint: None,
                scopes: &["openid", "email", "profile"],
                extra_params: &[
                    ("access_type", "offline"),
                    ("prompt", "select_account"),
                    ("include_granted_scopes", "true"),
                ],
                claims: ClaimMapping {
                    subject: &["sub", "id"],
                    email: &["email"],
                    name: &["name"],
                    avatar: &["picture"],
                },
            },
            ProviderKind::Microsoft => {
                let tenant = tenant
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or("common");
                ProviderCapability {
                    authorization_endpoint: format!(
                        "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/authorize"
                    ),
                    token_endpoint: format!(
                        "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"
                    ),
                    profile_endpoint: "https://graph.microsoft.com/v1.0/me",
                    email_endpoint: None,
                    scopes: &["openid", "email", "profile"],
                    extra_params: &[("prompt", "select_account")],
                    claims: ClaimMapping {
                        subject: &["id"],
                        email: &["mail", "userPrincipalName"],
                        name: &["displayName"],
                        avatar: &[],
                    },
                }
            }
            // GitHub is plain OAuth 2.0, so it has no `openid` scope.
            ProviderKind::GitHub => ProviderCapability {
                authorization_endpoint: "https://github.com/login/oauth/authorize".to_string(),
                token_endpoint: "https://github.com/login/oauth/access_token".to_string(),
                profile_endpoint: "https://api.github.com/user",
                email_endpoint: Some("https://api.github.com/user/emails"),
                scopes: &["read:user", "user:email"],
                extra_params: &[],
                claims: ClaimMapping {
                    subject: &["id"],
                    email: &["email"],
                    name: &["name", "login"],
                    avatar: &["avatar_url"],
                },
            },
        }
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Credentials
//=========================================================================================

/// Client credentials for one configured provider.
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: String,
    pub tenant: Option<String>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            kind,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant: None,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// A provider is usable only with both a client id and a client secret.
    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }

    pub fn capability(&self) -> ProviderCapability {
        self.kind.capability(self.tenant.as_deref())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant", &self.tenant)
            .finish()
    }
}

//=========================================================================================
// Capability Record
//=========================================================================================

/// Endpoints, scopes and claim names for one provider.
#[derive(Debug, Clone)]
pub struct ProviderCapability {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub profile_endpoint: &'static str,
    /// Secondary endpoint listing the account's addresses, for profiles that may omit email.
    pub email_endpoint: Option<&'static str>,
    pub scopes: &'static [&'static str],
    pub extra_params: &'static [(&'static str, &'static str)],
    pub claims: ClaimMapping,
}

impl ProviderCapability {
    /// Builds the URL the browser is sent to in order to start the authorization-code grant.
    pub fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        state: &str,
    ) -> Result<Url, url::ParseError> {
        let scope = self.scopes.join(" ");
        let mut url = Url::parse(&self.authorization_endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("scope", &scope)
                .append_pair("state", state)
                .append_pair("response_type", "code");
            for (key, value) in self.extra_params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MissingClaim {
    #[error("profile is missing a subject id")]
    Subject,
    #[error("profile is missing an email address")]
    Email,
}

/// Candidate field names for each normalized claim, tried in order.
#[derive(Debug, Clone, Copy)]
pub struct ClaimMapping {
    pub subject: &'static [&'static str],
    pub email: &'static [&'static str],
    pub name: &'static [&'static str],
    pub avatar: &'static [&'static str],
}

impl ClaimMapping {
    /// Maps a raw profile document onto an `OAuthProfile`.
    ///
    /// `fallback_email` is used when none of the email fields is present. A missing
    /// display name falls back to the email address.
    pub fn extract(
        &self,
        provider: ProviderKind,
        claims: &Value,
        fallback_email: Option<String>,
    ) -> Result<OAuthProfile, MissingClaim> {
        let subject = first_claim(claims, self.subject).ok_or(MissingClaim::Subject)?;
        let email = first_claim(claims, self.email)
            .or(fallback_email)
            .ok_or(MissingClaim::Email)?;
        let name = first_claim(claims, self.name).unwrap_or_else(|| email.clone());
        let avatar_url = first_claim(claims, self.avatar);

        Ok(OAuthProfile {
            provider,
            subject,
            email,
            name,
            avatar_url,
        })
    }

    pub fn has_email(&self, claims: &Value) -> bool {
        first_claim(claims, self.email).is_some()
    }
}

/// Returns the first candidate field holding a non-empty string or a number.
fn first_claim(claims: &Value, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|key| match claims.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Picks the primary, verified address out of a GitHub-style `/user/emails` listing.
pub fn primary_verified_email(listing: &Value) -> Option<String> {
    listing.as_array()?.iter().find_map(|entry| {
        let primary = entry.get("primary").and_then(Value::as_bool).unwrap_or(false);
        let verified = entry.get("verified").and_then(Value::as_bool).unwrap_or(false);
        if primary && verified {
            entry.get("email").and_then(Value::as_str).map(str::to_string)
        } else {
            None
        }
    })
}
