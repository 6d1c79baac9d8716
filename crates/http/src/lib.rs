//! Taskboard HTTP client
//!
//! [`ApiClient`] performs authenticated JSON calls with transparent token
//! refresh, [`AuthService`] manages the user session on top of it, and
//! [`QueryClient`] keeps a prefix-invalidated cache of task and project reads.

pub mod auth;
pub mod client;
pub mod config;
pub mod query;

pub use auth::{AuthError, AuthService};
pub use client::{
    ApiClient, ApiClientBuilder, ApiError, ApiRequest, BuildError, ErrorKind, Navigator,
    RequestOptions, TracingNavigator,
};
pub use config::ClientConfig;
pub use query::{QueryCache, QueryClient, QueryKey};
