//! blog_client: terminal client for the blog platform REST API
//!
//! Session handling (durable tokens in Sled, JWT decode, refresh-on-401),
//! role-based gating, comment thread assembly and text views.

pub mod api;
pub mod auth;
pub mod comment_tree;
pub mod config;
pub mod error;
pub mod forms;
pub mod gate;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod storage;
// Text views over the services, one per route
pub mod views;

pub use api::{ApiClient, ApiRequest, SessionEvent};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, FieldErrors};
pub use session::{SessionController, SessionState};
pub use storage::SessionStore;
