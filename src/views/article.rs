use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use crate::comment_tree::{self, AvatarResolver, CommentNode};
use crate::error::{ClientError, ClientResult, FieldErrors};
use crate::gate::Action;
use crate::models::{Article, ArticleId, CommentId};
use crate::routes::Route;
use crate::services::{articles, comments};
use crate::session::SessionController;

use super::{date, nav_bar, timestamp, MountGuard, View};

/// Inline edit in progress on one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEditState {
    pub comment_id: CommentId,
    pub text: String,
}

/// Article detail with its comment thread.
pub struct ArticleView {
    session: Arc<SessionController>,
    id: ArticleId,
    mount: MountGuard,
    avatars: AvatarResolver,
    article: Option<Article>,
    comments: Vec<CommentNode>,
    editing: Option<CommentEditState>,
    loading: bool,
    error: Option<String>,
}

impl ArticleView {
    pub fn new(session: Arc<SessionController>, id: ArticleId) -> Self {
        let config = session.api().config();
        let avatars = AvatarResolver::new(config.origin(), config.default_avatar.clone());
        Self {
            session,
            id,
            mount: MountGuard::new(),
            avatars,
            article: None,
            comments: Vec::new(),
            editing: None,
            loading: true,
            error: None,
        }
    }

    pub fn article(&self) -> Option<&Article> {
        self.article.as_ref()
    }

    pub fn comments(&self) -> &[CommentNode] {
        &self.comments
    }

    pub fn editing(&self) -> Option<&CommentEditState> {
        self.editing.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Refetch the whole comment set; no local patching.
    pub async fn reload_comments(&mut self) -> ClientResult<()> {
        let payload = comments::for_article(self.session.api(), self.id).await?;
        let forest = comment_tree::build_forest(payload, &self.avatars);
        self.mount.apply(|| self.comments = forest);
        Ok(())
    }

    pub async fn post_comment(&mut self, content: &str) -> ClientResult<()> {
        self.create_comment(content, None).await
    }

    pub async fn reply(&mut self, parent: CommentId, content: &str) -> ClientResult<()> {
        if comment_tree::find(&self.comments, parent).is_none() {
            return Err(ClientError::NotFound(format!("comment {parent}")));
        }
        self.create_comment(content, Some(parent)).await
    }

    async fn create_comment(&mut self, content: &str, reply_to: Option<CommentId>) -> ClientResult<()> {
        if !self.session.access().can(Action::ReplyComment, None) {
            return Err(ClientError::Unauthorized);
        }
        if content.trim().is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("content", "Comment cannot be empty");
            return Err(ClientError::Validation(errors));
        }
        comments::create(self.session.api(), self.id, content, reply_to).await?;
        tracing::info!(article_id = self.id, reply_to = ?reply_to, "comment posted");
        self.reload_comments().await
    }

    /// Swap a comment into an inline editable field.
    pub fn begin_edit(&mut self, id: CommentId) -> ClientResult<()> {
        let node = comment_tree::find(&self.comments, id)
            .ok_or_else(|| ClientError::NotFound(format!("comment {id}")))?;
        if !self.session.access().can(Action::EditComment, Some(&node.author_name)) {
            return Err(ClientError::Unauthorized);
        }
        self.editing = Some(CommentEditState {
            comment_id: id,
            text: node.content.clone(),
        });
        Ok(())
    }

    pub fn set_edit_text(&mut self, text: impl Into<String>) {
        if let Some(editing) = &mut self.editing {
            editing.text = text.into();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// PATCH the edited content, then reload the full thread.
    pub async fn submit_edit(&mut self) -> ClientResult<()> {
        let Some(editing) = self.editing.clone() else {
            return Err(ClientError::NotFound("comment being edited".into()));
        };
        if editing.text.trim().is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("content", "Comment cannot be empty");
            return Err(ClientError::Validation(errors));
        }
        comments::edit(self.session.api(), editing.comment_id, &editing.text).await?;
        tracing::info!(comment_id = editing.comment_id, "comment updated");
        self.editing = None;
        self.reload_comments().await
    }

    pub async fn delete_comment(&mut self, id: CommentId) -> ClientResult<()> {
        if !self.session.access().can(Action::DeleteComment, None) {
            return Err(ClientError::Unauthorized);
        }
        comments::delete(self.session.api(), id).await?;
        tracing::info!(comment_id = id, "comment deleted");
        self.reload_comments().await
    }

    /// Delete the article; the caller navigates to the returned route.
    pub async fn delete_article(&mut self) -> ClientResult<Route> {
        if !self.session.access().can(Action::DeleteArticle, None) {
            return Err(ClientError::Unauthorized);
        }
        articles::delete(self.session.api(), self.id).await?;
        tracing::info!(article_id = self.id, "article deleted");
        Ok(Route::Home)
    }

    fn render_comments(&self, out: &mut String) {
        let access = self.session.access();
        let rendered = comment_tree::render(&self.comments, &access);
        if rendered.is_empty() {
            let _ = writeln!(out, "No comments yet.");
        }
        for line in rendered {
            let indent = "    ".repeat(line.depth);
            let node = line.node;
            let _ = writeln!(
                out,
                "{indent}#{} {} ({}) [{}]",
                node.id,
                node.author_name,
                timestamp(&node.created_at),
                node.avatar_url
            );
            match &self.editing {
                Some(editing) if editing.comment_id == node.id => {
                    let _ = writeln!(out, "{indent}  > editing: {}", editing.text);
                }
                _ => {
                    let _ = writeln!(out, "{indent}  {}", node.content);
                }
            }
            let mut actions = Vec::new();
            if line.actions.reply {
                actions.push("reply");
            }
            if line.actions.edit {
                actions.push("edit");
            }
            if line.actions.delete {
                actions.push("delete");
            }
            if !actions.is_empty() {
                let _ = writeln!(out, "{indent}  [{}]", actions.join("] ["));
            }
        }
    }
}

#[async_trait]
impl View for ArticleView {
    fn route(&self) -> Route {
        Route::Article(self.id)
    }

    /// Article and comments are fetched concurrently.
    async fn load(&mut self) -> ClientResult<()> {
        self.loading = true;
        let api = self.session.api();
        let (article, payload) =
            futures::join!(articles::get(api, self.id), comments::for_article(api, self.id));

        if let Err(err) = &payload {
            tracing::error!(error = %err, article_id = self.id, "error fetching comments");
        }
        let forest = payload
            .map(|payload| comment_tree::build_forest(payload, &self.avatars))
            .unwrap_or_default();

        let result = match article {
            Ok(article) => {
                self.mount.apply(|| {
                    self.article = Some(article);
                    self.comments = forest;
                    self.error = None;
                });
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, article_id = self.id, "error fetching article");
                self.mount.apply(|| {
                    self.article = None;
                    self.error = Some(match &err {
                        ClientError::NotFound(_) => "Article not found.".to_string(),
                        other => other.user_message(),
                    });
                });
                Err(err)
            }
        };
        self.mount.apply(|| self.loading = false);
        result
    }

    fn render(&self) -> String {
        let access = self.session.access();
        let mut out = String::new();
        let _ = writeln!(out, "{}", nav_bar(&access));
        let _ = writeln!(out);

        if self.loading {
            let _ = writeln!(out, "Loading article...");
            return out;
        }
        let Some(article) = &self.article else {
            let _ = writeln!(out, "{}", self.error.as_deref().unwrap_or("Article not found."));
            return out;
        };

        let _ = writeln!(out, "{}", article.title);
        let _ = writeln!(out, "By {} • {}", article.author, date(&article.created_at));
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", article.content);
        let _ = writeln!(out);
        if !article.tags.is_empty() {
            let tags: Vec<String> = article
                .tags
                .iter()
                .map(|t| format!("{t} ({})", Route::Tag(t.clone())))
                .collect();
            let _ = writeln!(out, "Tags: {}", tags.join(", "));
        }

        let mut controls = Vec::new();
        if access.can(Action::EditArticle, None) {
            controls.push(format!("edit {}", Route::EditArticle(article.id)));
        }
        if access.can(Action::DeleteArticle, None) {
            controls.push("delete".to_string());
        }
        if !controls.is_empty() {
            let _ = writeln!(out, "{}", controls.join(" | "));
        }

        let _ = writeln!(out, "----");
        let _ = writeln!(out, "Comments");
        self.render_comments(&mut out);
        out
    }

    fn mount(&self) -> &MountGuard {
        &self.mount
    }
}
