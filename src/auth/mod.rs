//! Authentication module: credential persistence and the session lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: durable key/value storage for the bearer token and
//!   host override
//! - `SessionManager`: the authentication state machine driving the whole app
//! - the foreground revalidation trigger
//!
//! The persisted token is opaque; validity is decided by the server, either
//! eagerly via `revalidate` or lazily via the 401 interceptor.

pub mod credentials;
pub mod lifecycle;
pub mod session;

pub use credentials::{CredentialStore, StoreError, ACCESS_TOKEN_KEY, HOST_KEY};
pub use lifecycle::{spawn_foreground_revalidation, AppLifecycle};
pub use session::{SessionManager, SessionState};
