use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ClientError, ClientResult};
use crate::gate::Action;
use crate::models::{Article, ArticleId, Page};
use crate::routes::Route;
use crate::services::articles;
use crate::session::SessionController;

use super::{date, nav_bar, MountGuard, View};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    All,
    Search(String),
    Tag(String),
}

/// Home, search results and tag browsing: one paginated article listing.
pub struct ArticleListView {
    session: Arc<SessionController>,
    source: ListSource,
    mount: MountGuard,
    page: Page<Article>,
    loading: bool,
    error: Option<String>,
}

impl ArticleListView {
    pub fn new(session: Arc<SessionController>, source: ListSource) -> Self {
        Self {
            session,
            source,
            mount: MountGuard::new(),
            page: Page::default(),
            loading: true,
            error: None,
        }
    }

    pub fn source(&self) -> &ListSource {
        &self.source
    }

    pub fn page(&self) -> &Page<Article> {
        &self.page
    }

    pub fn articles(&self) -> &[Article] {
        &self.page.results
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Load the page behind a cursor; `None` loads the first page.
    pub async fn load_page(&mut self, cursor: Option<&str>) -> ClientResult<()> {
        self.loading = true;
        let api = self.session.api();
        let result = match &self.source {
            ListSource::All => articles::list(api, cursor).await,
            ListSource::Search(query) => articles::search(api, query, cursor).await,
            ListSource::Tag(tag) => articles::by_tag(api, tag, cursor).await,
        };

        match result {
            Ok(page) => {
                self.mount.apply(|| {
                    self.page = page;
                    self.error = None;
                    self.loading = false;
                });
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, source = ?self.source, "failed to load articles");
                self.mount.apply(|| {
                    self.error = Some(err.user_message());
                    self.loading = false;
                });
                Err(err)
            }
        }
    }

    /// Follow the server's `next` cursor. Returns false on the last page.
    pub async fn next_page(&mut self) -> ClientResult<bool> {
        match self.page.next.clone() {
            Some(next) => self.load_page(Some(&next)).await.map(|_| true),
            None => Ok(false),
        }
    }

    pub async fn previous_page(&mut self) -> ClientResult<bool> {
        match self.page.previous.clone() {
            Some(previous) => self.load_page(Some(&previous)).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Delete an article and drop it from the local page without refetching.
    pub async fn delete_article(&mut self, id: ArticleId) -> ClientResult<()> {
        if !self.session.access().can(Action::DeleteArticle, None) {
            return Err(ClientError::Unauthorized);
        }
        articles::delete(self.session.api(), id).await?;
        tracing::info!(article_id = id, "article deleted");
        self.mount.apply(|| self.page.results.retain(|a| a.id != id));
        Ok(())
    }

    fn heading(&self) -> String {
        match &self.source {
            ListSource::All => "Latest articles".to_string(),
            ListSource::Search(query) => format!("Search results for \"{query}\""),
            ListSource::Tag(tag) => format!("Articles tagged \"{tag}\""),
        }
    }
}

#[async_trait]
impl View for ArticleListView {
    fn route(&self) -> Route {
        match &self.source {
            ListSource::All => Route::Home,
            ListSource::Search(query) => Route::Search(query.clone()),
            ListSource::Tag(tag) => Route::Tag(tag.clone()),
        }
    }

    async fn load(&mut self) -> ClientResult<()> {
        self.load_page(None).await
    }

    fn render(&self) -> String {
        let access = self.session.access();
        let mut out = String::new();
        let _ = writeln!(out, "{}", nav_bar(&access));
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.heading());

        if self.loading {
            let _ = writeln!(out, "Loading articles...");
            return out;
        }
        if let Some(error) = &self.error {
            let _ = writeln!(out, "{error}");
            return out;
        }
        if self.page.results.is_empty() {
            let _ = writeln!(out, "No articles found.");
        }

        let can_edit = access.can(Action::EditArticle, None);
        let can_delete = access.can(Action::DeleteArticle, None);
        for article in &self.page.results {
            let _ = writeln!(out);
            let _ = writeln!(out, "[{}] {}", article.id, article.title);
            let _ = writeln!(out, "    by {} on {}", article.author, date(&article.created_at));
            if !article.tags.is_empty() {
                let tags: Vec<String> = article
                    .tags
                    .iter()
                    .map(|t| format!("#{t}"))
                    .collect();
                let _ = writeln!(out, "    {}", tags.join(" "));
            }
            let mut links = vec![format!("read {}", Route::Article(article.id))];
            if can_edit {
                links.push(format!("edit {}", Route::EditArticle(article.id)));
            }
            if can_delete {
                links.push("delete".to_string());
            }
            let _ = writeln!(out, "    {}", links.join(" | "));
        }

        let _ = writeln!(out);
        let mut pager = Vec::new();
        if self.page.previous.is_some() {
            pager.push("< previous");
        }
        if self.page.next.is_some() {
            pager.push("next >");
        }
        if !pager.is_empty() {
            let _ = writeln!(out, "{}", pager.join("   "));
        }
        out
    }

    fn mount(&self) -> &MountGuard {
        &self.mount
    }
}
