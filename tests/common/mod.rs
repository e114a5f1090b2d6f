//! In-process mock of the blog REST backend.
//!
//! Served by axum on an ephemeral port. Access tokens are real (unsigned
//! checks only) JWTs so the client can decode the user id from them.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use blog_client::routes::RecordingNavigator;
use blog_client::{ApiClient, ClientConfig, SessionController, SessionStore};

pub const PASSWORD: &str = "Secret#123";
pub const PAGE_SIZE: usize = 2;

pub const ALICE: i64 = 1; // Moderators
pub const BOB: i64 = 2; // Members
pub const CAROL: i64 = 3; // Editors
pub const ROOT: i64 = 4; // superuser, no groups

pub struct User {
    pub profile: Value,
    pub password: String,
}

pub struct MockBackend {
    pub base: String,
    pub refresh_enabled: AtomicBool,
    /// Protected endpoints answer 401 no matter which token is sent.
    pub reject_all: AtomicBool,
    pub refresh_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub comment_fetches: AtomicUsize,
    pub comment_patches: AtomicUsize,
    pub article_deletes: AtomicUsize,
    pub sessions: Mutex<HashMap<String, i64>>,
    pub refresh_tokens: Mutex<HashMap<String, i64>>,
    pub users: Mutex<Vec<User>>,
    pub articles: Mutex<Vec<Value>>,
    pub comments: Mutex<Vec<Value>>,
    pub registrations: Mutex<Vec<HashMap<String, String>>>,
}

type Shared = Arc<MockBackend>;

fn user(id: i64, username: &str, groups: &[&str], is_superuser: bool) -> User {
    User {
        profile: json!({
            "id": id,
            "username": username,
            "email": format!("{username}@example.com"),
            "first_name": "",
            "last_name": "",
            "profile": {"bio": null, "profile_pic": null, "birth_date": null},
            "groups": groups,
            "permissions": [],
            "is_superuser": is_superuser,
        }),
        password: PASSWORD.to_string(),
    }
}

fn article(id: i64, title: &str, tags: &[&str]) -> Value {
    json!({
        "id": id,
        "title": title,
        "author": "alice",
        "author_profile_pic": null,
        "content": format!("Body of {title}"),
        "tags": tags,
        "created_at": format!("2025-03-0{id}T10:00:00Z"),
        "updated_at": null,
    })
}

fn comment(id: i64, content: &str, author: &str, pic: Option<&str>, reply_to: Option<i64>) -> Value {
    json!({
        "id": id,
        "article": 1,
        "content": content,
        "author_name": author,
        "author_profile_pic": pic,
        "created_at": format!("2025-03-01T1{}:00:00Z", id - 10),
        "updated_at": null,
        "reply_to": reply_to,
    })
}

impl MockBackend {
    fn seeded(base: String) -> Self {
        Self {
            base,
            refresh_enabled: AtomicBool::new(true),
            reject_all: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            comment_fetches: AtomicUsize::new(0),
            comment_patches: AtomicUsize::new(0),
            article_deletes: AtomicUsize::new(0),
            sessions: Mutex::new(HashMap::new()),
            refresh_tokens: Mutex::new(HashMap::new()),
            users: Mutex::new(vec![
                user(ALICE, "alice", &["Moderators"], false),
                user(BOB, "bob", &["Members"], false),
                user(CAROL, "carol", &["Editors"], false),
                user(ROOT, "root", &[], true),
            ]),
            articles: Mutex::new(vec![
                article(1, "Hello Rust", &["rust", "intro"]),
                article(2, "Async in practice", &["rust", "async"]),
                article(3, "Gardening", &["outdoors"]),
            ]),
            comments: Mutex::new(vec![
                comment(10, "First!", "bob", None, None),
                comment(11, "Welcome", "alice", Some("/media/profile_pics/alice.png"), Some(10)),
                comment(12, "Nice read", "carol", Some("https://cdn.example.com/c.png"), None),
            ]),
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// Mint a fresh access token for `user_id` and accept it from now on.
    pub fn issue_access(&self, user_id: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = json!({
            "token_type": "access",
            "exp": now + 300,
            "iat": now,
            "jti": uuid::Uuid::new_v4().to_string(),
            "user_id": user_id,
        });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"mock-secret"))
            .expect("encode access token");
        self.sessions.lock().unwrap().insert(token.clone(), user_id);
        token
    }

    pub fn issue_pair(&self, user_id: i64) -> (String, String) {
        let refresh = format!("refresh-{}", uuid::Uuid::new_v4());
        self.refresh_tokens.lock().unwrap().insert(refresh.clone(), user_id);
        (self.issue_access(user_id), refresh)
    }

    /// Invalidate every access token handed out so far.
    pub fn expire_access(&self) {
        self.sessions.lock().unwrap().clear();
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn article_ids(&self) -> Vec<i64> {
        self.articles
            .lock()
            .unwrap()
            .iter()
            .filter_map(|a| a["id"].as_i64())
            .collect()
    }

    fn username(&self, user_id: i64) -> String {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.profile["id"] == user_id)
            .and_then(|u| u.profile["username"].as_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// `Ok(None)` for anonymous access to a public endpoint.
    fn authenticate(&self, headers: &HeaderMap, required: bool) -> Result<Option<i64>, Response> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        let Some(token) = bearer else {
            return if required { Err(unauthorized()) } else { Ok(None) };
        };
        if required && self.reject_all.load(Ordering::SeqCst) {
            return Err(unauthorized());
        }
        match self.sessions.lock().unwrap().get(&token) {
            Some(user_id) => Ok(Some(*user_id)),
            None => Err(unauthorized()),
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"})),
    )
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response()
}

async fn obtain_token(State(mock): State<Shared>, Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let user_id = mock
        .users
        .lock()
        .unwrap()
        .iter()
        .find(|u| u.profile["username"] == username && u.password == password)
        .and_then(|u| u.profile["id"].as_i64());
    match user_id {
        Some(id) => {
            let (access, refresh) = mock.issue_pair(id);
            Json(json!({"access": access, "refresh": refresh})).into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response(),
    }
}

async fn refresh_token(State(mock): State<Shared>, Json(body): Json<Value>) -> Response {
    mock.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let refresh = body["refresh"].as_str().unwrap_or_default();
    let user_id = mock.refresh_tokens.lock().unwrap().get(refresh).copied();
    match user_id {
        Some(id) if mock.refresh_enabled.load(Ordering::SeqCst) => {
            Json(json!({"access": mock.issue_access(id)})).into_response()
        }
        _ => unauthorized(),
    }
}

async fn register(State(mock): State<Shared>, mut multipart: Multipart) -> Response {
    let mut fields = HashMap::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            fields.insert(name, file_name);
            continue;
        }
        fields.insert(name, field.text().await.unwrap_or_default());
    }
    let username = fields.get("username").cloned().unwrap_or_default();
    let taken = mock
        .users
        .lock()
        .unwrap()
        .iter()
        .any(|u| u.profile["username"] == username.as_str());
    if taken {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"username": ["A user with that username already exists."]})),
        )
            .into_response();
    }

    let mut users = mock.users.lock().unwrap();
    let id = users.len() as i64 + 1;
    let mut new_user = user(id, &username, &["Members"], false);
    new_user.password = fields.get("password").cloned().unwrap_or_default();
    users.push(new_user);
    mock.registrations.lock().unwrap().push(fields);
    (StatusCode::CREATED, Json(json!({"id": id, "username": username}))).into_response()
}

async fn user_profile(State(mock): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if let Err(resp) = mock.authenticate(&headers, true) {
        return resp;
    }
    mock.profile_calls.fetch_add(1, Ordering::SeqCst);
    let users = mock.users.lock().unwrap();
    match users.iter().find(|u| u.profile["id"] == id) {
        Some(u) => Json(u.profile.clone()).into_response(),
        None => not_found(),
    }
}

async fn list_articles(
    State(mock): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = mock.authenticate(&headers, false) {
        return resp;
    }
    let articles = mock.articles.lock().unwrap().clone();

    // Search answers with a bare array, like the unpaginated search endpoint.
    if let Some(query) = params.get("search") {
        let query = query.to_lowercase();
        let hits: Vec<Value> = articles
            .into_iter()
            .filter(|a| {
                a["title"].as_str().unwrap_or_default().to_lowercase().contains(&query)
                    || a["tags"]
                        .as_array()
                        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(query.as_str())))
            })
            .collect();
        return Json(hits).into_response();
    }

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let start = (page - 1) * PAGE_SIZE;
    let results: Vec<Value> = articles.iter().skip(start).take(PAGE_SIZE).cloned().collect();
    let next = (start + PAGE_SIZE < articles.len())
        .then(|| format!("{}/api/articles/?page={}", mock.base, page + 1));
    let previous = match page {
        1 => None,
        2 => Some(format!("{}/api/articles/", mock.base)),
        n => Some(format!("{}/api/articles/?page={}", mock.base, n - 1)),
    };
    Json(json!({
        "count": articles.len(),
        "next": next,
        "previous": previous,
        "results": results,
    }))
    .into_response()
}

async fn create_article(State(mock): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let user_id = match mock.authenticate(&headers, true) {
        Ok(user_id) => user_id.unwrap_or_default(),
        Err(resp) => return resp,
    };
    if body["title"].as_str().unwrap_or_default().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"title": ["This field may not be blank."]})))
            .into_response();
    }
    let mut articles = mock.articles.lock().unwrap();
    let id = articles.iter().filter_map(|a| a["id"].as_i64()).max().unwrap_or(0) + 1;
    let created = json!({
        "id": id,
        "title": body["title"],
        "author": mock.username(user_id),
        "author_profile_pic": null,
        "content": body["content"],
        "tags": body["tags"],
        "created_at": "2025-04-01T09:00:00Z",
        "updated_at": null,
    });
    articles.push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn get_article(State(mock): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if let Err(resp) = mock.authenticate(&headers, false) {
        return resp;
    }
    let articles = mock.articles.lock().unwrap();
    match articles.iter().find(|a| a["id"] == id) {
        Some(a) => Json(a.clone()).into_response(),
        None => not_found(),
    }
}

async fn update_article(
    State(mock): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(resp) = mock.authenticate(&headers, true) {
        return resp;
    }
    let mut articles = mock.articles.lock().unwrap();
    let Some(existing) = articles.iter_mut().find(|a| a["id"] == id) else {
        return not_found();
    };
    existing["title"] = body["title"].clone();
    existing["content"] = body["content"].clone();
    existing["tags"] = body["tags"].clone();
    existing["updated_at"] = json!("2025-04-02T09:00:00Z");
    Json(existing.clone()).into_response()
}

async fn delete_article(State(mock): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if let Err(resp) = mock.authenticate(&headers, true) {
        return resp;
    }
    mock.article_deletes.fetch_add(1, Ordering::SeqCst);
    mock.articles.lock().unwrap().retain(|a| a["id"] != id);
    StatusCode::NO_CONTENT.into_response()
}

async fn article_comments(State(mock): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if let Err(resp) = mock.authenticate(&headers, false) {
        return resp;
    }
    mock.comment_fetches.fetch_add(1, Ordering::SeqCst);
    let comments: Vec<Value> = mock
        .comments
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c["article"] == id)
        .cloned()
        .collect();
    Json(comments).into_response()
}

async fn create_comment(State(mock): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let user_id = match mock.authenticate(&headers, true) {
        Ok(user_id) => user_id.unwrap_or_default(),
        Err(resp) => return resp,
    };
    let mut comments = mock.comments.lock().unwrap();
    let id = comments.iter().filter_map(|c| c["id"].as_i64()).max().unwrap_or(0) + 1;
    let created = json!({
        "id": id,
        "article": body["article"],
        "content": body["content"],
        "author_name": mock.username(user_id),
        "author_profile_pic": null,
        "created_at": "2025-03-02T08:00:00Z",
        "updated_at": null,
        "reply_to": body.get("reply_to").cloned().unwrap_or(Value::Null),
    });
    comments.push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn edit_comment(
    State(mock): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(resp) = mock.authenticate(&headers, true) {
        return resp;
    }
    mock.comment_patches.fetch_add(1, Ordering::SeqCst);
    let mut comments = mock.comments.lock().unwrap();
    let Some(existing) = comments.iter_mut().find(|c| c["id"] == id) else {
        return not_found();
    };
    existing["content"] = body["content"].clone();
    Json(existing.clone()).into_response()
}

async fn delete_comment(State(mock): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if let Err(resp) = mock.authenticate(&headers, true) {
        return resp;
    }
    mock.comments.lock().unwrap().retain(|c| c["id"] != id);
    StatusCode::NO_CONTENT.into_response()
}

fn router(mock: Shared) -> Router {
    Router::new()
        .route("/api/token/", post(obtain_token))
        .route("/api/token/refresh/", post(refresh_token))
        .route("/api/register/", post(register))
        .route("/api/users/:id/", get(user_profile))
        .route("/api/articles/", get(list_articles).post(create_article))
        .route(
            "/api/articles/:id/",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route("/api/articles/:id/comments/", get(article_comments))
        .route("/api/comments/", post(create_comment))
        .route("/api/comments/:id/", patch(edit_comment).delete(delete_comment))
        .with_state(mock)
}

pub async fn spawn_backend() -> Shared {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("mock backend address");
    let mock = Arc::new(MockBackend::seeded(format!("http://{addr}")));
    let app = router(Arc::clone(&mock));
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("mock backend stopped");
    });
    mock
}

/// A client wired to a fresh mock backend and a temporary session store.
pub struct Harness {
    pub backend: Shared,
    pub api: ApiClient,
    pub session: Arc<SessionController>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    pub async fn new() -> Self {
        let backend = spawn_backend().await;
        let config = ClientConfig::default()
            .with_backend_url(&backend.base)
            .expect("mock backend url");
        let store = SessionStore::temporary().expect("temporary session store");
        let api = ApiClient::new(config, store);
        let navigator = Arc::new(RecordingNavigator::new());
        let session = Arc::new(SessionController::new(api.clone(), navigator.clone()));
        Self {
            backend,
            api,
            session,
            navigator,
        }
    }

    /// Store a freshly issued token pair without hydrating.
    pub fn store_tokens(&self, user_id: i64) -> (String, String) {
        let (access, refresh) = self.backend.issue_pair(user_id);
        self.api.store().set(&access, &refresh).expect("store tokens");
        (access, refresh)
    }

    /// Store tokens for `user_id` and run startup hydration.
    pub async fn sign_in(&self, user_id: i64) {
        self.store_tokens(user_id);
        self.session.init().await;
    }
}
