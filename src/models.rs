use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type ArticleId = i64;
pub type CommentId = i64;
pub type UserId = i64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub author_profile_pic: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/articles/` and `PUT /api/articles/{id}/`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

impl From<&Article> for ArticleDraft {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            content: article.content.clone(),
            tags: article.tags.clone(),
        }
    }
}

/// One page of a paginated listing. `next`/`previous` are opaque server URLs.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub count: Option<u64>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            count: None,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }
}

// The list endpoint answers with `{results, next, previous}` when paginated
// and with a bare array otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum PageRepr<T> {
    Paginated {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
        results: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Page<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match PageRepr::deserialize(deserializer)? {
            PageRepr::Paginated {
                count,
                next,
                previous,
                results,
            } => Page {
                count,
                next,
                previous,
                results,
            },
            PageRepr::Bare(results) => Page {
                count: Some(results.len() as u64),
                next: None,
                previous: None,
                results,
            },
        })
    }
}

/// A comment as served by `GET /api/articles/{id}/comments/`.
///
/// `replies` is filled by the server's nested listing or by
/// [`crate::comment_tree::build_forest`] for flat payloads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    #[serde(default)]
    pub article: Option<ArticleId>,
    pub content: String,
    #[serde(default = "deleted_author")]
    pub author_name: String,
    #[serde(default)]
    pub author_profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reply_to: Option<CommentId>,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

fn deleted_author() -> String {
    "Deleted User".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub content: String,
    pub article: ArticleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<CommentId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileDetails {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

/// `GET /api/users/{id}/`. Never persisted; refetched on every hydration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile: Option<ProfileDetails>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub is_superuser: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// `POST /api/token/` response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// `POST /api/token/refresh/` response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access: String,
}
