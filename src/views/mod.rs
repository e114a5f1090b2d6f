//! Terminal views.
//!
//! Each view owns its component-local state, loads it through the shared
//! session's [`ApiClient`](crate::api::ApiClient), and renders plain text.
//! Results that arrive after a view was unmounted are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::gate::{Access, Action};
use crate::routes::Route;
use crate::session::SessionController;

pub mod article;
pub mod auth;
pub mod editor;
pub mod list;

pub use article::ArticleView;
pub use auth::{LoginView, RegisterView};
pub use editor::{EditorMode, EditorView};
pub use list::{ArticleListView, ListSource};

#[async_trait]
pub trait View: Send {
    fn route(&self) -> Route;

    /// Fetch everything the view shows.
    async fn load(&mut self) -> ClientResult<()>;

    fn render(&self) -> String;

    /// Where the view wants to go instead of rendering, if anywhere.
    fn redirect(&self) -> Option<Route> {
        None
    }

    fn mount(&self) -> &MountGuard;
}

/// Shared "still mounted" flag for a view.
///
/// Clones observe the same flag, so whoever tears the view down can flip it
/// while a request is still in flight.
#[derive(Debug, Clone)]
pub struct MountGuard(Arc<AtomicBool>);

impl Default for MountGuard {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl MountGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Apply `update` only while mounted. Returns whether it ran.
    pub fn apply<F: FnOnce()>(&self, update: F) -> bool {
        if self.is_mounted() {
            update();
            true
        } else {
            tracing::debug!("view unmounted, dropping stale result");
            false
        }
    }
}

/// Build the view for a route.
pub fn open(route: Route, session: Arc<SessionController>) -> Box<dyn View> {
    match route {
        Route::Home => Box::new(ArticleListView::new(session, ListSource::All)),
        Route::Search(query) => Box::new(ArticleListView::new(session, ListSource::Search(query))),
        Route::Tag(tag) => Box::new(ArticleListView::new(session, ListSource::Tag(tag))),
        Route::Article(id) => Box::new(ArticleView::new(session, id)),
        Route::CreateArticle => Box::new(EditorView::new(session, EditorMode::Create)),
        Route::EditArticle(id) => Box::new(EditorView::new(session, EditorMode::Edit(id))),
        Route::Login => Box::new(LoginView::new(session)),
        Route::Register => Box::new(RegisterView::new(session)),
    }
}

/// The navigation bar line shown above every view.
pub fn nav_bar(access: &Access) -> String {
    let mut items = vec!["Home /".to_string(), "Search /search/<query>".to_string()];
    if access.can(Action::CreateArticle, None) {
        items.push(format!("Create article {}", Route::CreateArticle));
    }
    if access.loading {
        items.push("...".to_string());
    } else if let Some(username) = &access.username {
        items.push(format!("Signed in as {username}"));
        items.push("Logout".to_string());
    } else {
        items.push(format!("Login {}", Route::Login));
        items.push(format!("Register {}", Route::Register));
    }
    items.join(" | ")
}

pub(crate) fn date(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

pub(crate) fn timestamp(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
