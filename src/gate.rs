//! Role-based visibility decisions.
//!
//! This is advisory: it decides what the client offers, while the server
//! re-checks every mutation on its own.

use crate::routes::Route;

pub const MODERATORS: &str = "Moderators";
pub const EDITORS: &str = "Editors";
pub const MEMBERS: &str = "Members";

/// True iff the session is a superuser or holds at least one allowed group.
pub fn authorize<S: AsRef<str>, A: AsRef<str>>(
    current_groups: &[S],
    is_superuser: bool,
    allowed_groups: &[A],
) -> bool {
    is_superuser
        || current_groups
            .iter()
            .any(|group| allowed_groups.iter().any(|allowed| allowed.as_ref() == group.as_ref()))
}

/// Authoring and moderation actions offered by the views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateArticle,
    EditArticle,
    DeleteArticle,
    EditComment,
    ReplyComment,
    DeleteComment,
}

impl Action {
    /// Groups allowed to perform the action (superusers always are).
    pub fn allowed_groups(self) -> &'static [&'static str] {
        match self {
            Action::CreateArticle => &[MODERATORS],
            Action::EditArticle => &[MODERATORS, EDITORS],
            Action::DeleteArticle => &[MODERATORS],
            Action::EditComment => &[MODERATORS, EDITORS],
            Action::ReplyComment => &[MODERATORS, EDITORS, MEMBERS],
            Action::DeleteComment => &[MODERATORS],
        }
    }

    /// Whether the author of the target may act regardless of group.
    fn allows_author(self) -> bool {
        matches!(self, Action::EditComment)
    }
}

/// What the gate knows about the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Access {
    pub username: Option<String>,
    pub groups: Vec<String>,
    pub is_superuser: bool,
    pub loading: bool,
}

impl Access {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    /// `author` is the username owning the target, for actions that honour it.
    pub fn can(&self, action: Action, author: Option<&str>) -> bool {
        if action.allows_author() {
            if let (Some(me), Some(author)) = (self.username.as_deref(), author) {
                if me == author {
                    return true;
                }
            }
        }
        authorize(&self.groups, self.is_superuser, action.allowed_groups())
    }
}

/// Outcome of guarding a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Session still hydrating; show a pending state and decide later.
    Pending,
    Allow,
    Redirect(Route),
}

/// Decide whether a protected view may render.
pub fn guard<A: AsRef<str>>(access: &Access, allowed_groups: &[A]) -> GateDecision {
    if access.loading {
        return GateDecision::Pending;
    }
    if authorize(&access.groups, access.is_superuser, allowed_groups) {
        GateDecision::Allow
    } else {
        GateDecision::Redirect(Route::Home)
    }
}
