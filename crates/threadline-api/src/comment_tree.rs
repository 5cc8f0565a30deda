use std::collections::HashMap;

use threadline_db::models::CommentRow;
use threadline_types::api::CommentNode;

pub const DELETED_AUTHOR: &str = "[deleted]";

/// Build the reply forest of one post. `comments` is in store order (id
/// ascending); siblings keep that order. `votes` gives the live total of a
/// comment. Comments whose parent is not in `comments` are not emitted.
pub fn build_comment_tree<F>(comments: &[CommentRow], votes: F) -> Vec<CommentNode>
where
    F: Fn(i64) -> i64,
{
    let mut by_parent: HashMap<Option<i64>, Vec<usize>> = HashMap::new();
    for (idx, comment) in comments.iter().enumerate() {
        by_parent.entry(comment.parent_id).or_default().push(idx);
    }

    build_level(None, comments, &by_parent, &votes)
}

fn build_level<F>(
    parent: Option<i64>,
    comments: &[CommentRow],
    by_parent: &HashMap<Option<i64>, Vec<usize>>,
    votes: &F,
) -> Vec<CommentNode>
where
    F: Fn(i64) -> i64,
{
    let Some(children) = by_parent.get(&parent) else {
        return Vec::new();
    };

    children
        .iter()
        .map(|&idx| {
            let row = &comments[idx];
            let mut node = comment_node(row, votes(row.id));
            node.children = build_level(Some(row.id), comments, by_parent, votes);
            node
        })
        .collect()
}

/// A single comment with no children attached.
pub fn comment_node(row: &CommentRow, votes: i64) -> CommentNode {
    CommentNode {
        id: row.id,
        content: row.content.clone(),
        created_at: row.created_at,
        author_username: author_name(row.author_username.as_deref()),
        parent_id: row.parent_id,
        post_id: row.post_id,
        children: Vec::new(),
        votes,
    }
}

pub fn author_name(username: Option<&str>) -> String {
    username.unwrap_or(DELETED_AUTHOR).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(id: i64, parent_id: Option<i64>) -> CommentRow {
        CommentRow {
            id,
            content: format!("comment {id}"),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, id as u32).unwrap(),
            post_id: 1,
            author_id: "u1".into(),
            author_username: Some("alice".into()),
            parent_id,
        }
    }

    fn count(nodes: &[CommentNode]) -> usize {
        nodes.iter().map(|n| 1 + count(&n.children)).sum()
    }

    #[test]
    fn test_reply_nests_under_parent() {
        let comments = vec![row(1, None), row(2, Some(1)), row(3, None)];
        let votes: HashMap<i64, i64> = [(1, 2), (2, -1)].into_iter().collect();

        let tree = build_comment_tree(&comments, |id| votes.get(&id).copied().unwrap_or(0));

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, 1);
        assert_eq!(tree[0].votes, 2);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].id, 2);
        assert_eq!(tree[0].children[0].votes, -1);
        assert_eq!(tree[0].children[0].parent_id, Some(1));
        assert_eq!(tree[1].id, 3);
        assert_eq!(tree[1].votes, 0);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_siblings_keep_input_order() {
        let comments = vec![row(1, None), row(4, Some(1)), row(7, Some(1)), row(9, Some(1))];
        let tree = build_comment_tree(&comments, |_| 0);
        let ids: Vec<i64> = tree[0].children.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![4, 7, 9]);
    }

    #[test]
    fn test_every_reachable_comment_appears_once() {
        let comments = vec![
            row(1, None),
            row(2, Some(1)),
            row(3, Some(2)),
            row(4, None),
            row(5, Some(4)),
            // Parent 99 is not part of this post.
            row(6, Some(99)),
        ];
        let tree = build_comment_tree(&comments, |_| 0);
        assert_eq!(count(&tree), 5);
    }

    #[test]
    fn test_deep_chain() {
        let mut comments = vec![row(1, None)];
        for id in 2..=50 {
            comments.push(row(id, Some(id - 1)));
        }
        let tree = build_comment_tree(&comments, |_| 1);

        let mut depth = 0;
        let mut level = &tree;
        while let Some(node) = level.first() {
            depth += 1;
            assert_eq!(node.votes, 1);
            level = &node.children;
        }
        assert_eq!(depth, 50);
    }

    #[test]
    fn test_deleted_author() {
        let mut orphan = row(1, None);
        orphan.author_username = None;
        let node = comment_node(&orphan, 0);
        assert_eq!(node.author_username, DELETED_AUTHOR);
        assert!(node.children.is_empty());
    }
}
