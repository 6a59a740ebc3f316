pub mod catalog;
pub mod db;
pub mod oauth_http;

pub use db::DbAdapter;
pub use oauth_http::ReqwestOAuthClient;
