//! OAuth login: provider capability records, the pending-login store and the
//! flow controller.

pub mod controller;
pub mod pending;
pub mod provider;

pub use controller::{AuthError, LoginRedirect, OAuthController, CALLBACK_PATH, PENDING_LOGIN_TTL_MINUTES};
pub use pending::InMemoryPendingLogins;
pub use provider::{ClaimMapping, MissingClaim, ProviderCapability, ProviderConfig, ProviderKind, UnknownProvider};
