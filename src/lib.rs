//! # basebuild-client
//!
//! Rust client for the BaseBuild API: session lifecycle, credential
//! persistence, and the authenticated request pipeline.
//!
//! The [`SessionStore`] is the public surface (login, logout, profile
//! fetch/update, token refresh), backed by a write-through [`storage`]
//! adapter. Underneath it, [`ApiClient`] attaches the bearer token to every
//! request and recovers expired sessions with a bounded, race-safe refresh
//! protocol. UI layers register a [`SessionObserver`] to route the user
//! back to login when the session dies.
//!
//! ```no_run
//! use std::sync::Arc;
//! use basebuild_client::{ApiClient, ClientConfig, MemoryStorage, SessionStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://api.basebuild.example");
//! let client = Arc::new(ApiClient::connect(&config, Box::new(MemoryStorage::new()))?);
//! let session = SessionStore::new(client);
//! session.init();
//! session.login("nanny", "Password123!").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod ops;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use session::{SessionObserver, SessionPhase, SessionStore};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, StorageValue};
pub use transport::{HttpTransport, Method, Transport, TransportError, TransportRequest, TransportResponse};
pub use types::{Envelope, LoginData, TokenPair, UserPatch, UserRecord};
