//! Traversal of threaded comment replies.
//!
//! Replies are visited depth-first, each reply before its own replies. The
//! walk stops at the first reply that is already known: the server is assumed
//! to deliver threads so that everything after a known reply is known too.
//! That ordering is not verified, so a new reply placed after a known one in
//! a non-monotonic thread is never visited.

use std::ops::ControlFlow;

use crate::model::Comment;
use crate::types::ActivityId;

/// A reply visited during a thread walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadNode<'a> {
    pub comment: &'a Comment,
    /// Nesting level below the outer comment, starting at 0.
    pub depth: usize,
    pub is_new: bool,
}

/// Result of walking a comment thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadWalk<'a> {
    /// Visited replies in traversal order. Only the last one can be known.
    pub nodes: Vec<ThreadNode<'a>>,
    /// ID of the known reply that ended the walk.
    pub stopped_at: Option<ActivityId>,
}

impl<'a> ThreadWalk<'a> {
    /// Replies that need a notification, in traversal order.
    pub fn new_replies(&self) -> impl Iterator<Item = &'a Comment> + '_ {
        self.nodes
            .iter()
            .filter(|node| node.is_new)
            .map(|node| node.comment)
    }
}

/// Walks `replies`, stopping at the first ID for which `is_known` holds.
pub fn walk_thread<F>(replies: &[Comment], is_known: F) -> ThreadWalk<'_>
where
    F: Fn(ActivityId) -> bool,
{
    let mut walk = ThreadWalk::default();
    if let ControlFlow::Break(id) = visit(replies, 0, &is_known, &mut walk.nodes) {
        walk.stopped_at = Some(id);
    }
    walk
}

fn visit<'a, F>(
    replies: &'a [Comment],
    depth: usize,
    is_known: &F,
    nodes: &mut Vec<ThreadNode<'a>>,
) -> ControlFlow<ActivityId>
where
    F: Fn(ActivityId) -> bool,
{
    for comment in replies {
        let is_new = !is_known(comment.id);
        nodes.push(ThreadNode {
            comment,
            depth,
            is_new,
        });
        if !is_new {
            return ControlFlow::Break(comment.id);
        }
        if let ControlFlow::Break(id) = visit(&comment.replies, depth + 1, is_known, nodes) {
            return ControlFlow::Break(id);
        }
    }
    ControlFlow::Continue(())
}
