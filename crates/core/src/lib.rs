//! Taskboard core types and session handling
//!
//! Everything here is transport-agnostic: the domain types exchanged with the
//! Taskboard API, the [`SessionStore`] abstraction over client-side key-value
//! storage, the [`TokenStorage`] helper, and the [`Session`] that ties tokens
//! and the cached user together.

pub mod error;
pub mod project;
pub mod session;
pub mod storage;
pub mod task;
pub mod timestamp;
pub mod token;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use project::{NewProject, Project, ProjectUpdate};
pub use session::Session;
pub use storage::{FileStore, MemoryStore, SessionStore};
pub use task::{NewTask, Task, TaskPriority, TaskStatus, TaskUpdate};
pub use token::{TokenStorage, decode_expiry, is_token_expired, is_token_expired_at};
pub use types::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RefreshRequest, RefreshResponse,
    ResetPasswordRequest, SignupRequest, User,
};
