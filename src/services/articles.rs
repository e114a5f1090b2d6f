use reqwest::Url;

use crate::api::{ApiClient, ApiRequest};
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::models::{Article, ArticleDraft, ArticleId, Page};

pub const ARTICLES_PATH: &str = "/api/articles/";

/// First page of all articles, or the page behind a `next`/`previous` cursor.
pub async fn list(api: &ApiClient, cursor: Option<&str>) -> ClientResult<Page<Article>> {
    api.fetch(ApiRequest::get(cursor.unwrap_or(ARTICLES_PATH))).await
}

pub async fn search(api: &ApiClient, query: &str, cursor: Option<&str>) -> ClientResult<Page<Article>> {
    let target = match cursor {
        Some(cursor) => cursor.to_string(),
        None => search_url(api.config(), query)?.to_string(),
    };
    api.fetch(ApiRequest::get(target)).await
}

/// Tag browsing goes through the same search filter as free-text search.
pub async fn by_tag(api: &ApiClient, tag: &str, cursor: Option<&str>) -> ClientResult<Page<Article>> {
    search(api, tag, cursor).await
}

pub async fn get(api: &ApiClient, id: ArticleId) -> ClientResult<Article> {
    api.fetch(ApiRequest::get(format!("{ARTICLES_PATH}{id}/"))).await
}

pub async fn create(api: &ApiClient, draft: &ArticleDraft) -> ClientResult<Article> {
    api.fetch(ApiRequest::post(ARTICLES_PATH).json(draft)?).await
}

pub async fn update(api: &ApiClient, id: ArticleId, draft: &ArticleDraft) -> ClientResult<Article> {
    api.fetch(ApiRequest::put(format!("{ARTICLES_PATH}{id}/")).json(draft)?)
        .await
}

pub async fn delete(api: &ApiClient, id: ArticleId) -> ClientResult<()> {
    api.send(ApiRequest::delete(format!("{ARTICLES_PATH}{id}/"))).await
}

fn search_url(config: &ClientConfig, query: &str) -> ClientResult<Url> {
    let mut url = config.endpoint(ARTICLES_PATH)?;
    url.query_pairs_mut().append_pair("search", query);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_encodes_query() {
        let config = ClientConfig::default();
        assert_eq!(
            search_url(&config, "rust").unwrap().as_str(),
            "http://127.0.0.1:8000/api/articles/?search=rust"
        );
        assert_eq!(
            search_url(&config, "async & await").unwrap().as_str(),
            "http://127.0.0.1:8000/api/articles/?search=async+%26+await"
        );
    }
}
