//! Client-side routes and the navigation seam.

use std::fmt;
use std::sync::Mutex;

use crate::models::ArticleId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    Article(ArticleId),
    CreateArticle,
    EditArticle(ArticleId),
    Search(String),
    Tag(String),
}

impl Route {
    /// Parse a client path. Unknown paths yield `None`.
    ///
    /// `/` and `/home` both map to [`Route::Home`]; trailing slashes are ignored.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] | ["home"] => Some(Route::Home),
            ["login"] => Some(Route::Login),
            ["register"] => Some(Route::Register),
            ["create-article"] => Some(Route::CreateArticle),
            ["article", id] => id.parse().ok().map(Route::Article),
            ["edit-article", id] => id.parse().ok().map(Route::EditArticle),
            ["search", query] => Some(Route::Search(percent_decode(query))),
            ["tag", tag] => Some(Route::Tag(percent_decode(tag))),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Article(id) => format!("/article/{id}"),
            Route::CreateArticle => "/create-article".to_string(),
            Route::EditArticle(id) => format!("/edit-article/{id}"),
            Route::Search(query) => format!("/search/{}", percent_encode(query)),
            Route::Tag(tag) => format!("/tag/{}", percent_encode(tag)),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

fn percent_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

/// Where forced navigations go.
///
/// Logout performs a hard redirect: every piece of view state derived from
/// the old session must be discarded, not merely re-routed.
pub trait Navigator: Send + Sync {
    fn hard_redirect(&self, route: &Route);
}

/// Discards redirects. Used where no front end is attached.
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn hard_redirect(&self, route: &Route) {
        tracing::debug!(route = %route, "redirect ignored");
    }
}

/// Records every redirect; lets callers inspect where the session sent them.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<Route> {
        self.visited
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Route> {
        self.visited().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn hard_redirect(&self, route: &Route) {
        self.visited
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(route.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_route() {
        assert_eq!(Route::parse("/"), Some(Route::Home));
        assert_eq!(Route::parse("/home"), Some(Route::Home));
        assert_eq!(Route::parse("/login"), Some(Route::Login));
        assert_eq!(Route::parse("/register/"), Some(Route::Register));
        assert_eq!(Route::parse("/article/12"), Some(Route::Article(12)));
        assert_eq!(Route::parse("/create-article"), Some(Route::CreateArticle));
        assert_eq!(Route::parse("/edit-article/3"), Some(Route::EditArticle(3)));
        assert_eq!(
            Route::parse("/search/rust%20async"),
            Some(Route::Search("rust async".into()))
        );
        assert_eq!(Route::parse("/tag/web"), Some(Route::Tag("web".into())));
    }

    #[test]
    fn test_unknown_or_bad_paths() {
        assert_eq!(Route::parse("/article/abc"), None);
        assert_eq!(Route::parse("/nope"), None);
        assert_eq!(Route::parse("/article/1/extra"), None);
    }

    #[test]
    fn test_path_round_trips_through_parse() {
        let route = Route::Search("c++ & rust".into());
        assert_eq!(Route::parse(&route.path()), Some(route));
        assert_eq!(Route::Home.to_string(), "/");
    }

    #[test]
    fn test_parse_keeps_plus_in_segments() {
        assert_eq!(Route::parse("/search/c++"), Some(Route::Search("c++".into())));
        assert_eq!(Route::parse("/tag/a+b%2Bc"), Some(Route::Tag("a+b+c".into())));
    }

    #[test]
    fn test_recording_navigator() {
        let nav = RecordingNavigator::new();
        nav.hard_redirect(&Route::Home);
        nav.hard_redirect(&Route::Login);
        assert_eq!(nav.visited(), vec![Route::Home, Route::Login]);
        assert_eq!(nav.last(), Some(Route::Login));
    }
}
