pub mod clock;
pub mod comments;
pub mod domain;
pub mod oauth;
pub mod ports;
pub mod registry;
pub mod session;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use comments::{CommentError, CommentService};
pub use domain::{
    AuthenticatedUser, Comment, CommentStats, CommentWithAuthor, Document, DocumentKind,
    OAuthProfile, PendingLogin, Session, User,
};
pub use oauth::{AuthError, InMemoryPendingLogins, OAuthController, ProviderConfig, ProviderKind};
pub use ports::{DatabaseService, OAuthHttpClient, PendingLoginStore, PortError, PortResult, TokenRequest};
pub use registry::{DocumentRegistry, RegistryError};
pub use session::{SessionStatus, SessionStore};
