//! Reply-tree construction for article comments.
//!
//! The server answers either with roots whose `replies` are already nested,
//! or with a flat list linked by `reply_to`. Both are flattened and rebuilt
//! through an id-indexed arena so malformed input (duplicate ids, missing
//! parents, cycles) cannot produce repeated nodes or unbounded recursion.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::gate::{Access, Action};
use crate::models::{Comment, CommentId};

/// A comment placed in the reply tree, with a display-ready avatar URL.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub id: CommentId,
    pub content: String,
    pub author_name: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
    pub reply_to: Option<CommentId>,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of nodes in this subtree, including itself.
    pub fn subtree_size(&self) -> usize {
        let mut size = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            size += 1;
            stack.extend(node.replies.iter());
        }
        size
    }
}

// Reply chains can be arbitrarily deep, so children are released from a work
// list instead of through nested drop calls.
impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// Builds absolute avatar URLs from the backend's relative media paths.
#[derive(Debug, Clone)]
pub struct AvatarResolver {
    origin: String,
    default_avatar: String,
}

impl AvatarResolver {
    pub fn new(origin: impl Into<String>, default_avatar: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            default_avatar: default_avatar.into(),
        }
    }

    pub fn resolve(&self, profile_pic: Option<&str>) -> String {
        match profile_pic.map(str::trim).filter(|p| !p.is_empty()) {
            None => self.default_avatar.clone(),
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => url.to_string(),
            Some(path) if path.starts_with('/') => format!("{}{}", self.origin, path),
            Some(path) => format!("{}/{}", self.origin, path),
        }
    }
}

/// Flatten a possibly nested payload into pre-order, detaching `replies`.
///
/// A nested reply's parent is taken from its position in the payload.
pub fn flatten(payload: Vec<Comment>) -> Vec<Comment> {
    let mut flat = Vec::new();
    // Reversed so popping yields input order.
    let mut stack: Vec<(Comment, Option<CommentId>)> =
        payload.into_iter().rev().map(|c| (c, None)).collect();

    while let Some((mut comment, parent)) = stack.pop() {
        if parent.is_some() {
            comment.reply_to = parent;
        }
        let replies = std::mem::take(&mut comment.replies);
        let id = comment.id;
        stack.extend(replies.into_iter().rev().map(|r| (r, Some(id))));
        flat.push(comment);
    }
    flat
}

/// Reconstruct the reply forest from comments linked by `reply_to`.
///
/// Siblings keep their relative input order. Duplicate ids keep the first
/// occurrence. Comments whose parent is missing become roots, and a cycle is
/// broken at its first member in input order.
pub fn build_forest(comments: Vec<Comment>, avatars: &AvatarResolver) -> Vec<CommentNode> {
    let mut index: HashMap<CommentId, usize> = HashMap::with_capacity(comments.len());
    let mut arena: Vec<Comment> = Vec::with_capacity(comments.len());
    for comment in flatten(comments) {
        if index.contains_key(&comment.id) {
            tracing::warn!(comment_id = comment.id, "duplicate comment id dropped");
            continue;
        }
        index.insert(comment.id, arena.len());
        arena.push(comment);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
    let mut roots = Vec::new();
    for (pos, comment) in arena.iter().enumerate() {
        match comment.reply_to.and_then(|parent| index.get(&parent).copied()) {
            Some(parent) if parent != pos => children[parent].push(pos),
            Some(_) => roots.push(pos),
            None => {
                if let Some(parent) = comment.reply_to {
                    tracing::debug!(comment_id = comment.id, parent, "parent missing, promoted to root");
                }
                roots.push(pos);
            }
        }
    }

    let mut builder = ForestBuilder {
        arena: &arena,
        children: &children,
        visited: vec![false; arena.len()],
        avatars,
    };
    let mut forest: Vec<CommentNode> = roots.iter().filter_map(|&pos| builder.attach(pos)).collect();

    for pos in 0..arena.len() {
        if !builder.visited[pos] {
            tracing::warn!(comment_id = arena[pos].id, "reply cycle broken");
            forest.extend(builder.attach(pos));
        }
    }
    forest
}

struct ForestBuilder<'a> {
    arena: &'a [Comment],
    children: &'a [Vec<usize>],
    visited: Vec<bool>,
    avatars: &'a AvatarResolver,
}

/// A node whose children are still being attached.
struct Frame {
    pos: usize,
    node: CommentNode,
    next_child: usize,
}

impl ForestBuilder<'_> {
    fn node(&self, pos: usize) -> CommentNode {
        let comment = &self.arena[pos];
        CommentNode {
            id: comment.id,
            content: comment.content.clone(),
            author_name: comment.author_name.clone(),
            avatar_url: self.avatars.resolve(comment.author_profile_pic.as_deref()),
            created_at: comment.created_at,
            reply_to: comment.reply_to,
            replies: Vec::new(),
        }
    }

    /// Build the subtree under `root` in post-order with an explicit stack.
    /// Returns `None` only if `root` was already placed.
    fn attach(&mut self, root: usize) -> Option<CommentNode> {
        if self.visited[root] {
            return None;
        }
        self.visited[root] = true;
        let children = self.children;
        let mut stack = vec![Frame { pos: root, node: self.node(root), next_child: 0 }];

        while let Some(frame) = stack.last_mut() {
            if let Some(&child) = children[frame.pos].get(frame.next_child) {
                frame.next_child += 1;
                if !self.visited[child] {
                    self.visited[child] = true;
                    let node = self.node(child);
                    stack.push(Frame { pos: child, node, next_child: 0 });
                }
                continue;
            }

            let done = stack.pop()?;
            match stack.last_mut() {
                Some(parent) => parent.node.replies.push(done.node),
                None => return Some(done.node),
            }
        }
        None
    }
}

/// Which controls a rendered comment offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentActions {
    pub edit: bool,
    pub reply: bool,
    pub delete: bool,
}

impl CommentActions {
    pub fn for_comment(access: &Access, author_name: &str) -> Self {
        Self {
            edit: access.can(Action::EditComment, Some(author_name)),
            reply: access.can(Action::ReplyComment, None),
            delete: access.can(Action::DeleteComment, None),
        }
    }
}

/// One line of the rendered thread, parent before children.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedComment<'a> {
    pub depth: usize,
    pub node: &'a CommentNode,
    pub actions: CommentActions,
}

/// Depth-first walk of the forest with per-node actions.
pub fn render<'a>(forest: &'a [CommentNode], access: &Access) -> Vec<RenderedComment<'a>> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, &CommentNode)> = forest.iter().rev().map(|n| (0, n)).collect();
    while let Some((depth, node)) = stack.pop() {
        out.push(RenderedComment {
            depth,
            node,
            actions: CommentActions::for_comment(access, &node.author_name),
        });
        stack.extend(node.replies.iter().rev().map(|r| (depth + 1, r)));
    }
    out
}

pub fn find(forest: &[CommentNode], id: CommentId) -> Option<&CommentNode> {
    let mut stack: Vec<&CommentNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.id == id {
            return Some(node);
        }
        stack.extend(node.replies.iter().rev());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment(id: CommentId, reply_to: Option<CommentId>) -> Comment {
        Comment {
            id,
            article: Some(1),
            content: format!("comment {id}"),
            author_name: "alice".into(),
            author_profile_pic: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, id as u32 % 60).unwrap(),
            updated_at: None,
            reply_to,
            replies: Vec::new(),
        }
    }

    fn avatars() -> AvatarResolver {
        AvatarResolver::new("http://127.0.0.1:8000/", "/default_profile.png")
    }

    fn shape(forest: &[CommentNode]) -> Vec<(CommentId, Vec<CommentId>)> {
        forest
            .iter()
            .map(|n| (n.id, n.replies.iter().map(|r| r.id).collect()))
            .collect()
    }

    #[test]
    fn test_flat_example() {
        let forest = build_forest(
            vec![comment(1, None), comment(2, Some(1)), comment(3, None)],
            &avatars(),
        );
        assert_eq!(shape(&forest), vec![(1, vec![2]), (3, vec![])]);
    }

    #[test]
    fn test_nested_payload_is_kept() {
        let mut root = comment(1, None);
        let mut child = comment(2, Some(1));
        child.replies.push(comment(4, Some(2)));
        root.replies.push(child);
        root.replies.push(comment(3, Some(1)));

        let forest = build_forest(vec![root], &avatars());
        assert_eq!(shape(&forest), vec![(1, vec![2, 3])]);
        assert_eq!(forest[0].replies[0].replies[0].id, 4);
        assert_eq!(forest[0].subtree_size(), 4);
    }

    #[test]
    fn test_every_node_once_and_sibling_order_kept() {
        let input = vec![
            comment(10, None),
            comment(11, Some(10)),
            comment(12, None),
            comment(13, Some(10)),
            comment(14, Some(11)),
            comment(15, Some(12)),
            comment(16, Some(10)),
        ];
        let forest = build_forest(input, &avatars());
        let order: Vec<CommentId> = render(&forest, &Access::anonymous())
            .iter()
            .map(|r| r.node.id)
            .collect();
        assert_eq!(order, vec![10, 11, 14, 13, 16, 12, 15]);
        assert_eq!(forest.iter().map(CommentNode::subtree_size).sum::<usize>(), 7);
    }

    #[test]
    fn test_reply_listed_before_parent() {
        let forest = build_forest(vec![comment(2, Some(1)), comment(1, None)], &avatars());
        assert_eq!(shape(&forest), vec![(1, vec![2])]);
    }

    #[test]
    fn test_duplicates_missing_parents_and_cycles() {
        let input = vec![
            comment(1, None),
            comment(1, None),
            comment(2, Some(99)),
            comment(3, Some(4)),
            comment(4, Some(3)),
            comment(5, Some(5)),
        ];
        let forest = build_forest(input, &avatars());
        assert_eq!(
            shape(&forest),
            vec![(1, vec![]), (2, vec![]), (5, vec![]), (3, vec![4])]
        );
        assert_eq!(forest.iter().map(CommentNode::subtree_size).sum::<usize>(), 5);
    }

    #[test]
    fn test_avatar_resolution() {
        let resolver = avatars();
        assert_eq!(resolver.resolve(None), "/default_profile.png");
        assert_eq!(resolver.resolve(Some("")), "/default_profile.png");
        assert_eq!(
            resolver.resolve(Some("/media/profile_pics/a.png")),
            "http://127.0.0.1:8000/media/profile_pics/a.png"
        );
        assert_eq!(
            resolver.resolve(Some("media/a.png")),
            "http://127.0.0.1:8000/media/a.png"
        );
        assert_eq!(
            resolver.resolve(Some("https://cdn.example.com/a.png")),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn test_render_depth_and_actions() {
        let mut reply = comment(2, Some(1));
        reply.author_name = "bob".into();
        let forest = build_forest(vec![comment(1, None), reply], &avatars());

        let alice = Access {
            username: Some("alice".into()),
            groups: vec!["Members".into()],
            is_superuser: false,
            loading: false,
        };
        let rendered = render(&forest, &alice);
        assert_eq!(rendered.len(), 2);
        assert_eq!((rendered[0].depth, rendered[1].depth), (0, 1));
        assert_eq!(
            rendered[0].actions,
            CommentActions { edit: true, reply: true, delete: false }
        );
        assert_eq!(
            rendered[1].actions,
            CommentActions { edit: false, reply: true, delete: false }
        );
        assert!(find(&forest, 2).is_some());
        assert!(find(&forest, 3).is_none());
    }

    #[test]
    fn test_deep_reply_chain_builds_and_drops() {
        const DEPTH: CommentId = 100_000;
        let chain: Vec<Comment> = (1..=DEPTH)
            .map(|id| comment(id, (id > 1).then(|| id - 1)))
            .collect();

        let forest = build_forest(chain, &avatars());

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].subtree_size(), DEPTH as usize);
        let deepest = find(&forest, DEPTH).expect("last reply is in the tree");
        assert_eq!(deepest.reply_to, Some(DEPTH - 1));
        assert!(deepest.replies.is_empty());
        let rendered = render(&forest, &Access::default());
        assert_eq!(rendered.last().map(|r| r.depth), Some(DEPTH as usize - 1));
        drop(rendered);
        drop(forest);
    }
}
