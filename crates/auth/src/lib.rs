pub mod account_lockout;
pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod session;

pub use account_lockout::{AccountLockoutService, LockoutPolicy, MAX_LOCKOUT_MINUTES};
pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use password::PasswordHasher;
pub use service::{AuthService, LoginRequest};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionMirror, SessionStore};
