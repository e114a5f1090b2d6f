//! Session lifecycle: startup hydration, login, logout.
//!
//! One [`SessionController`] is created per process and shared (`Arc`) with
//! every view. It is the only writer of the in-memory profile; the durable
//! tokens are written here and by the request pipeline on refresh.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::multipart;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::api::{check_status, ApiClient, SessionEvent};
use crate::auth::decode_token;
use crate::error::{ClientError, ClientResult};
use crate::forms::Registration;
use crate::gate::Access;
use crate::models::{Credentials, TokenPair, UserProfile};
use crate::routes::{Navigator, Route};
use crate::services::users;

pub const TOKEN_PATH: &str = "/api/token/";
pub const REGISTER_PATH: &str = "/api/register/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Loading,
    Authenticated(UserProfile),
    Anonymous,
}

impl SessionState {
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Uninitialized | SessionState::Loading)
    }
}

pub struct SessionController {
    api: ApiClient,
    navigator: Arc<dyn Navigator>,
    state: RwLock<SessionState>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(api: ApiClient, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            api,
            navigator,
            state: RwLock::new(SessionState::Uninitialized),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state().profile().cloned()
    }

    pub fn groups(&self) -> Vec<String> {
        self.user().map(|u| u.groups).unwrap_or_default()
    }

    pub fn permissions(&self) -> Vec<String> {
        self.user().map(|u| u.permissions).unwrap_or_default()
    }

    pub fn is_superuser(&self) -> bool {
        self.user().is_some_and(|u| u.is_superuser)
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    /// Snapshot for the authorization gate.
    pub fn access(&self) -> Access {
        match self.state() {
            SessionState::Authenticated(profile) => Access {
                username: Some(profile.username),
                groups: profile.groups,
                is_superuser: profile.is_superuser,
                loading: false,
            },
            state => Access {
                loading: state.is_loading(),
                ..Access::anonymous()
            },
        }
    }

    /// Startup hydration from the stored access token.
    ///
    /// Never fails: any problem ends in [`SessionState::Anonymous`].
    pub async fn init(&self) -> SessionState {
        let access = match self.api.store().access_token() {
            Ok(access) => access,
            Err(err) => {
                tracing::error!(error = %err, "cannot read session store");
                None
            }
        };

        let Some(token) = access else {
            self.set_state(SessionState::Anonymous);
            return self.state();
        };

        self.set_state(SessionState::Loading);
        if let Err(err) = self.hydrate(&token).await {
            tracing::info!(error = %err, "stored session is not usable, logging out");
            self.logout();
        }
        self.state()
    }

    /// Persist freshly issued tokens and hydrate the profile.
    ///
    /// Any failure routes through [`SessionController::logout`].
    pub async fn login(&self, access: &str, refresh: &str) -> ClientResult<UserProfile> {
        if let Err(err) = self.api.store().set(access, refresh) {
            self.logout();
            return Err(err.into());
        }
        self.set_state(SessionState::Loading);
        match self.hydrate(access).await {
            Ok(profile) => {
                tracing::info!(username = %profile.username, "logged in");
                Ok(profile)
            }
            Err(err) => {
                tracing::warn!(error = %err, "profile hydration failed after login");
                self.logout();
                Err(err)
            }
        }
    }

    /// `POST /api/token/` then [`SessionController::login`].
    pub async fn login_with_credentials(&self, username: &str, password: &str) -> ClientResult<UserProfile> {
        let tokens = self.obtain_tokens(username, password).await?;
        self.login(&tokens.access, &tokens.refresh).await
    }

    /// Multipart `POST /api/register/`, then log in with the same credentials.
    pub async fn register(&self, registration: &Registration) -> ClientResult<UserProfile> {
        let form = registration_form(registration).await?;
        let response = self
            .api
            .http()
            .post(self.api.url(REGISTER_PATH)?)
            .multipart(form)
            .send()
            .await?;
        check_status(response).await?;
        tracing::info!(username = %registration.username, "registered");
        self.login_with_credentials(&registration.username, &registration.password)
            .await
    }

    async fn obtain_tokens(&self, username: &str, password: &str) -> ClientResult<TokenPair> {
        let response = self
            .api
            .http()
            .post(self.api.url(TOKEN_PATH)?)
            .json(&Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::info!(username, "login rejected");
            return Err(ClientError::Unauthorized);
        }
        Ok(check_status(response).await?.json().await?)
    }

    async fn hydrate(&self, access: &str) -> ClientResult<UserProfile> {
        let claims = decode_token(access)?;
        if claims.is_expired() {
            tracing::debug!(user_id = claims.user_id, "stored access token is expired, relying on refresh");
        }
        let profile = users::profile(&self.api, claims.subject()).await?;
        self.set_state(SessionState::Authenticated(profile.clone()));
        Ok(profile)
    }

    /// Clear tokens and profile, then hard-redirect home.
    pub fn logout(&self) {
        if let Err(err) = self.api.store().clear() {
            tracing::error!(error = %err, "failed to clear session store");
        }
        self.set_state(SessionState::Anonymous);
        tracing::info!("logged out");
        self.navigator.hard_redirect(&Route::Home);
    }

    /// React to pipeline events: a failed refresh logs the session out.
    pub fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Expired => self.logout(),
            SessionEvent::Refreshed => tracing::debug!("session refreshed"),
        }
    }

    /// Watch the pipeline for expiry until the client is dropped.
    pub fn spawn_expiry_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.api.subscribe();
        let controller = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match controller.upgrade() {
                        Some(controller) => controller.handle_event(event),
                        None => break,
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

async fn registration_form(registration: &Registration) -> ClientResult<multipart::Form> {
    let mut form = multipart::Form::new();
    for (name, value) in registration.text_fields() {
        form = form.text(name, value);
    }
    if let Some(path) = &registration.profile_pic {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Config(format!("cannot read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "profile_pic".to_string());
        form = form.part("profile_pic", multipart::Part::bytes(bytes).file_name(file_name));
    }
    Ok(form)
}
