use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ClientError, ClientResult, FieldErrors};
use crate::forms::ArticleForm;
use crate::gate::{self, Action, GateDecision};
use crate::models::ArticleId;
use crate::routes::Route;
use crate::services::articles;
use crate::session::SessionController;

use super::{nav_bar, MountGuard, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit(ArticleId),
}

impl EditorMode {
    fn action(self) -> Action {
        match self {
            EditorMode::Create => Action::CreateArticle,
            EditorMode::Edit(_) => Action::EditArticle,
        }
    }
}

/// Protected create/edit article form.
pub struct EditorView {
    session: Arc<SessionController>,
    mode: EditorMode,
    mount: MountGuard,
    decision: GateDecision,
    pub form: ArticleForm,
    errors: FieldErrors,
    error: Option<String>,
    submitting: bool,
}

impl EditorView {
    pub fn new(session: Arc<SessionController>, mode: EditorMode) -> Self {
        Self {
            session,
            mode,
            mount: MountGuard::new(),
            decision: GateDecision::Pending,
            form: ArticleForm::default(),
            errors: FieldErrors::new(),
            error: None,
            submitting: false,
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn decision(&self) -> &GateDecision {
        &self.decision
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn check_gate(&mut self) -> GateDecision {
        let access = self.session.access();
        self.decision = gate::guard(&access, self.mode.action().allowed_groups());
        self.decision.clone()
    }

    /// Validate and send the form. Returns the article page to open next.
    pub async fn submit(&mut self) -> ClientResult<Route> {
        if self.check_gate() != GateDecision::Allow {
            return Err(ClientError::Unauthorized);
        }
        let draft = match self.form.to_draft() {
            Ok(draft) => draft,
            Err(ClientError::Validation(errors)) => {
                self.errors = errors.clone();
                return Err(ClientError::Validation(errors));
            }
            Err(err) => return Err(err),
        };

        self.submitting = true;
        self.errors = FieldErrors::new();
        let api = self.session.api();
        let result = match self.mode {
            EditorMode::Create => articles::create(api, &draft).await,
            EditorMode::Edit(id) => articles::update(api, id, &draft).await,
        };
        self.submitting = false;

        match result {
            Ok(article) => {
                tracing::info!(article_id = article.id, mode = ?self.mode, "article saved");
                Ok(Route::Article(article.id))
            }
            Err(ClientError::Validation(errors)) => {
                self.errors = errors.clone();
                Err(ClientError::Validation(errors))
            }
            Err(err) => {
                tracing::error!(error = %err, mode = ?self.mode, "failed to save article");
                self.error = Some(match self.mode {
                    EditorMode::Create => "Failed to create article. Please try again.".to_string(),
                    EditorMode::Edit(_) => "Failed to update article. Please try again.".to_string(),
                });
                Err(err)
            }
        }
    }

    fn render_field(&self, out: &mut String, label: &str, field: &str, value: &str) {
        let _ = writeln!(out, "{label}: {value}");
        for message in self.errors.get(field) {
            let _ = writeln!(out, "  ! {message}");
        }
    }
}

#[async_trait]
impl View for EditorView {
    fn route(&self) -> Route {
        match self.mode {
            EditorMode::Create => Route::CreateArticle,
            EditorMode::Edit(id) => Route::EditArticle(id),
        }
    }

    /// Decide the gate, then pre-fill the form when editing.
    async fn load(&mut self) -> ClientResult<()> {
        if self.check_gate() != GateDecision::Allow {
            return Ok(());
        }
        let EditorMode::Edit(id) = self.mode else {
            return Ok(());
        };
        match articles::get(self.session.api(), id).await {
            Ok(article) => {
                let form = ArticleForm::from_article(&article);
                self.mount.apply(|| self.form = form);
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, article_id = id, "error fetching article");
                self.mount
                    .apply(|| self.error = Some("Failed to load article data.".to_string()));
                Err(err)
            }
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", nav_bar(&self.session.access()));
        let _ = writeln!(out);
        match &self.decision {
            GateDecision::Pending => {
                let _ = writeln!(out, "Loading...");
                return out;
            }
            GateDecision::Redirect(route) => {
                let _ = writeln!(out, "Not allowed here, redirecting to {route}");
                return out;
            }
            GateDecision::Allow => {}
        }

        let _ = writeln!(
            out,
            "{}",
            match self.mode {
                EditorMode::Create => "Create Article",
                EditorMode::Edit(_) => "Edit Article",
            }
        );
        if let Some(error) = &self.error {
            let _ = writeln!(out, "{error}");
        }
        for message in self.errors.get(FieldErrors::NON_FIELD) {
            let _ = writeln!(out, "{message}");
        }
        self.render_field(&mut out, "Title", "title", &self.form.title);
        self.render_field(&mut out, "Content", "content", &self.form.content);
        self.render_field(&mut out, "Tags (comma-separated)", "tags", &self.form.tags);
        if self.submitting {
            let _ = writeln!(out, "Saving...");
        }
        out
    }

    fn redirect(&self) -> Option<Route> {
        match &self.decision {
            GateDecision::Redirect(route) => Some(route.clone()),
            _ => None,
        }
    }

    fn mount(&self) -> &MountGuard {
        &self.mount
    }
}
