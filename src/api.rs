//! The shared request pipeline.
//!
//! Every request carries `Authorization: Bearer <access>` when an access token
//! is stored. A 401 triggers exactly one refresh-and-replay cycle for that
//! request; a refresh failure clears the session, announces
//! [`SessionEvent::Expired`] and surfaces [`ClientError::SessionExpired`].

use reqwest::{header, Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, FieldErrors};
use crate::models::{AccessToken, RefreshRequest};
use crate::storage::SessionStore;

pub const TOKEN_REFRESH_PATH: &str = "/api/token/refresh/";

/// Session lifecycle notifications emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The access token was replaced by a refresh.
    Refreshed,
    /// Refresh failed and the stored session was cleared.
    Expired,
}

/// A replayable request description.
///
/// `reqwest::RequestBuilder` cannot always be cloned, so the pipeline keeps
/// what it needs to rebuild the request for the single replay.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Server path (`/api/articles/`) or absolute URL (pagination cursor).
    pub target: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> ClientResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
    store: SessionStore,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("backend_url", &self.config.backend_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: ClientConfig, store: SessionStore) -> Self {
        Self::with_http_client(config, store, Client::new())
    }

    pub fn with_http_client(config: ClientConfig, store: SessionStore, http: Client) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            http,
            config,
            store,
            events,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The raw HTTP client, for requests that bypass the pipeline
    /// (token issuance, registration).
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn url(&self, target: &str) -> ClientResult<Url> {
        self.config.endpoint(target)
    }

    /// Send and decode a JSON response body.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let response = self.execute(request).await?;
        Ok(response.json::<T>().await?)
    }

    /// Send and discard the response body (e.g. `204 No Content`).
    pub async fn send(&self, request: ApiRequest) -> ClientResult<()> {
        self.execute(request).await?;
        Ok(())
    }

    /// Run one request through the pipeline and return the successful response.
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<reqwest::Response> {
        let url = self.url(&request.target)?;
        let access = self.store.access_token()?;
        let response = self.dispatch(&request, &url, access.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        tracing::debug!(method = %request.method, url = %url, "401 received, refreshing access token");
        let access = match self.refresh().await {
            Ok(access) => access,
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed, clearing session");
                self.expire_session();
                return Err(ClientError::SessionExpired);
            }
        };

        // Replay exactly once; a second 401 is returned as-is.
        let replay = self.dispatch(&request, &url, Some(&access)).await?;
        if replay.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(method = %request.method, url = %url, "replayed request still unauthorized");
            return Err(ClientError::Unauthorized);
        }
        check_status(replay).await
    }

    /// Exchange the stored refresh token for a new access token and store it.
    pub async fn refresh(&self) -> ClientResult<String> {
        let refresh = self
            .store
            .refresh_token()?
            .ok_or(ClientError::Unauthorized)?;

        let response = self
            .http
            .post(self.url(TOKEN_REFRESH_PATH)?)
            .json(&RefreshRequest { refresh })
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        let body: AccessToken = check_status(response).await?.json().await?;

        self.store.set_access(&body.access)?;
        let _ = self.events.send(SessionEvent::Refreshed);
        tracing::info!("access token refreshed");
        Ok(body.access)
    }

    fn expire_session(&self) {
        if let Err(err) = self.store.clear() {
            tracing::error!(error = %err, "failed to clear session store");
        }
        // No receivers just means nobody is watching; not an error.
        let _ = self.events.send(SessionEvent::Expired);
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        url: &Url,
        access: Option<&str>,
    ) -> ClientResult<reqwest::Response> {
        let mut builder = self.http.request(request.method.clone(), url.clone());
        if let Some(token) = access {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(ClientError::Network)
    }
}

/// Map a non-success response onto the error taxonomy.
pub(crate) async fn check_status(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(%status, url = %url, "request failed");
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized,
        StatusCode::NOT_FOUND => ClientError::NotFound(url),
        StatusCode::BAD_REQUEST => ClientError::Validation(FieldErrors::from_body(&body)),
        _ => ClientError::Status { status, body },
    })
}
