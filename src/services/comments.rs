use crate::api::{ApiClient, ApiRequest};
use crate::error::ClientResult;
use crate::models::{ArticleId, Comment, CommentEdit, CommentId, NewComment};

pub const COMMENTS_PATH: &str = "/api/comments/";

/// Comments of an article, nested or flat depending on the server revision.
pub async fn for_article(api: &ApiClient, article: ArticleId) -> ClientResult<Vec<Comment>> {
    api.fetch(ApiRequest::get(format!("/api/articles/{article}/comments/")))
        .await
}

pub async fn create(
    api: &ApiClient,
    article: ArticleId,
    content: &str,
    reply_to: Option<CommentId>,
) -> ClientResult<Comment> {
    let body = NewComment {
        content: content.to_string(),
        article,
        reply_to,
    };
    api.fetch(ApiRequest::post(COMMENTS_PATH).json(&body)?).await
}

pub async fn edit(api: &ApiClient, id: CommentId, content: &str) -> ClientResult<Comment> {
    let body = CommentEdit {
        content: content.to_string(),
    };
    api.fetch(ApiRequest::patch(format!("{COMMENTS_PATH}{id}/")).json(&body)?)
        .await
}

pub async fn delete(api: &ApiClient, id: CommentId) -> ClientResult<()> {
    api.send(ApiRequest::delete(format!("{COMMENTS_PATH}{id}/"))).await
}
