//! crates/derecho_core/src/threading.rs
//!
//! Rebuilds comment threads from the flat, chronologically ordered list the
//! data store returns.

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::{Comment, CommentNode};

/// The threads of one article, plus the comments that could not be placed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentForest {
    /// Top-level comments in input order, each carrying its replies.
    pub roots: Vec<CommentNode>,
    /// Ids of comments left out of `roots`, in input order: replies whose
    /// parent is not in the set (and everything below them), and repeated ids.
    pub dropped: Vec<Uuid>,
}

impl CommentForest {
    /// Number of comments in the forest, replies at every depth included.
    pub fn total(&self) -> usize {
        count_comments(&self.roots)
    }
}

/// Builds the comment forest.
///
/// Comments without a parent become roots in the order they arrive; replies
/// are appended to their parent's replies in the order they arrive. A reply
/// whose parent is missing from `comments` is left out rather than promoted,
/// and reported in [`CommentForest::dropped`]. When an id repeats, the first
/// occurrence is kept.
pub fn build_comment_tree(comments: Vec<Comment>) -> CommentForest {
    let len = comments.len();

    // First pass: index every comment by id.
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(len);
    for (position, comment) in comments.iter().enumerate() {
        index.entry(comment.id).or_insert(position);
    }

    // Second pass: hang every comment off the root list or its parent.
    let mut root_positions = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); len];
    for (position, comment) in comments.iter().enumerate() {
        if index.get(&comment.id) != Some(&position) {
            continue;
        }
        match comment.parent_id {
            None => root_positions.push(position),
            Some(parent_id) => {
                if let Some(&parent) = index.get(&parent_id) {
                    children[parent].push(position);
                }
            }
        }
    }

    // Assemble owned nodes bottom-up. The walk uses an explicit stack so that
    // arbitrarily deep reply chains cannot overflow the call stack.
    let mut pending: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = (0..len).map(|_| None).collect();

    for &root in &root_positions {
        let mut stack = vec![(root, false)];
        while let Some((position, expanded)) = stack.pop() {
            if expanded {
                let replies = children[position]
                    .iter()
                    .filter_map(|&child| built[child].take())
                    .collect();
                if let Some(comment) = pending[position].take() {
                    built[position] = Some(CommentNode::with_replies(comment, replies));
                }
            } else {
                stack.push((position, true));
                for &child in children[position].iter().rev() {
                    stack.push((child, false));
                }
            }
        }
    }

    let roots = root_positions
        .iter()
        .filter_map(|&root| built[root].take())
        .collect();

    // Whatever was never consumed by the walk is unreachable from a root.
    let dropped = pending
        .into_iter()
        .flatten()
        .map(|comment| comment.id)
        .collect();

    CommentForest { roots, dropped }
}

/// Counts every node of the forest, replies at every depth included.
pub fn count_comments(roots: &[CommentNode]) -> usize {
    let mut total = 0;
    let mut stack: Vec<&CommentNode> = roots.iter().collect();
    while let Some(node) = stack.pop() {
        total += 1;
        stack.extend(node.replies.iter());
    }
    total
}
