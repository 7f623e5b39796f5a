//! Backtracking search over the trie.
//!
//! A [`Cursor`] is created for one lookup and dropped when it returns. It walks the
//! request segments left to right and, at each depth, tries candidate keys in strict
//! preference order:
//!
//! ```text
//! literal text  >  {digits}  >  {float}  >  {bool}  >  {string}
//! ```
//!
//! (the wildcard part of that order comes from the configured classifier). When a
//! subtree cannot complete the match, the cursor climbs back to the parent node and
//! resumes the previous segment from its next untried candidate. The search is an
//! explicit loop over a history stack, so deep paths never grow the call stack.

use std::borrow::Cow;

use tracing::trace;

use super::classify::{Classifier, ClassifierExhausted};
use super::node::{NodeId, Trie};

/// One segment being resolved.
#[derive(Debug, Clone, Copy)]
struct Frame<'p> {
    text: &'p str,
    // 0: untried. 1: tried as a literal. n > 1: classifier attempt n - 1 was last used.
    attempt: usize,
}

impl<'p> Frame<'p> {
    fn new(text: &'p str) -> Self {
        Self { text, attempt: 0 }
    }

    // Whether the key this frame resolved to came from the classifier.
    fn is_wildcard(&self) -> bool {
        self.attempt > 1
    }
}

/// Per-lookup search state.
pub(crate) struct Cursor<'r, 's, 'p, T> {
    trie: &'r Trie<T>,
    classifier: &'r Classifier,
    segments: &'s [&'p str],
    current: Frame<'p>,
    node: NodeId,
    // Committed frames, one per level above `current`. The segments after `current`
    // are `segments[history.len() + 1..]`.
    history: Vec<Frame<'p>>,
    captured: Vec<&'p str>,
}

impl<'r, 's, 'p, T> Cursor<'r, 's, 'p, T> {
    /// Prepares a search of `segments`, which must not be empty.
    pub(crate) fn new(
        trie: &'r Trie<T>,
        classifier: &'r Classifier,
        segments: &'s [&'p str],
    ) -> Self {
        Self {
            trie,
            classifier,
            segments,
            current: Frame::new(segments.first().copied().unwrap_or_default()),
            node: NodeId::ROOT,
            history: Vec::with_capacity(segments.len()),
            captured: Vec::new(),
        }
    }

    /// Runs the search to completion.
    ///
    /// Returns the matched leaf value and the texts of every segment that was resolved
    /// through a wildcard, in path order, or `None` once every possibility is spent.
    pub(crate) fn run(mut self) -> Option<(&'r T, Vec<&'p str>)> {
        let trie = self.trie;
        loop {
            let Ok(next) = self.resolve() else {
                if self.backtrack() {
                    continue;
                }
                return None;
            };

            if self.is_last_segment() {
                // A terminal node without a value is not a match; the remaining
                // candidates of this frame (and then its ancestors) still get a turn.
                if let Some(value) = trie.node(next).value() {
                    if self.current.is_wildcard() {
                        self.captured.push(self.current.text);
                    }
                    return Some((value, self.captured));
                }
                continue;
            }

            self.advance(next);
        }
    }

    fn is_last_segment(&self) -> bool {
        self.history.len() + 1 >= self.segments.len()
    }

    /// Finds the next existing child for the current frame.
    ///
    /// Each call resumes where the previous one for this frame stopped, so no candidate
    /// is tried twice at the same depth.
    fn resolve(&mut self) -> Result<NodeId, ClassifierExhausted> {
        let trie = self.trie;
        let node = trie.node(self.node);
        loop {
            self.current.attempt += 1;
            let key = if self.current.attempt == 1 {
                Cow::Borrowed(self.current.text)
            } else {
                match (self.classifier)(self.current.text, self.current.attempt - 1)? {
                    Some(key) => key,
                    None => continue,
                }
            };
            if let Some(child) = node.child(&key) {
                return Ok(child);
            }
        }
    }

    /// Commits the current frame and descends into `next`.
    fn advance(&mut self, next: NodeId) {
        if self.current.is_wildcard() {
            self.captured.push(self.current.text);
        }
        self.history.push(self.current);
        self.node = next;
        self.current = Frame::new(self.segments[self.history.len()]);
    }

    /// Undoes the most recent commitment.
    ///
    /// The abandoned segment goes back to being pending (it restarts from scratch once
    /// reached again); the popped frame keeps its attempt counter so its next resolution
    /// moves on to a fresh candidate. Returns `false` when there is nothing to undo.
    fn backtrack(&mut self) -> bool {
        let Some(parent) = self.trie.node(self.node).parent() else {
            return false;
        };
        let Some(frame) = self.history.pop() else {
            return false;
        };

        if frame.is_wildcard() {
            self.captured.pop();
        }
        trace!(
            abandoned = self.current.text,
            resume = frame.text,
            depth = self.history.len(),
            "backtracking"
        );
        self.node = parent;
        self.current = frame;
        true
    }
}
