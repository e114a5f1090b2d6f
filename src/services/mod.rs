//! Thin wrappers over the REST endpoints, all routed through [`ApiClient`].
//!
//! [`ApiClient`]: crate::api::ApiClient

pub mod articles;
pub mod comments;
pub mod users;
