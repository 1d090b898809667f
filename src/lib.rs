//! Bookshelf session core.
//!
//! Client-side session and authentication manager for the Bookshelf mobile
//! app. The crate owns the bearer credential lifecycle, the three-way
//! authentication state, and the HTTP pipeline that attaches and validates
//! the credential on every call. The UI shell consumes it like so:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bookshelf_core::auth::{spawn_foreground_revalidation, AppLifecycle, SessionManager};
//! use bookshelf_core::config::Config;
//! use bookshelf_core::router::{spawn_navigation_binder, Router};
//! use tokio::sync::watch;
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let session = Arc::new(SessionManager::new(&config)?);
//!
//! let (router, mut nav_commands) = Router::new();
//! let router = Arc::new(router);
//! spawn_navigation_binder(session.subscribe(), router.clone());
//!
//! let (lifecycle_tx, lifecycle_rx) = watch::channel(AppLifecycle::Active);
//! spawn_foreground_revalidation(session.clone(), lifecycle_rx);
//!
//! session.bootstrap().await;
//! // nav_commands now yields Route::Library or Route::Login;
//! // the CRUD screens call session.client() for their requests.
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod retry;
pub mod router;

pub use api::{ApiClient, ApiError};
pub use auth::{AppLifecycle, CredentialStore, SessionManager, SessionState, StoreError};
pub use config::Config;
pub use router::{Route, Router};
