//! Path-trie routing with typed wildcards and backtracking search.
//!
//! A [`Router`] stores values under `/`-separated path templates. Each template segment
//! is either literal text or one of the reserved wildcard tokens:
//!
//! | Token      | Accepts                                   | Example match |
//! |------------|-------------------------------------------|---------------|
//! | `{digits}` | integral numbers                          | `42`, `42.0`  |
//! | `{float}`  | other floating-point numbers              | `42.5`        |
//! | `{bool}`   | `true` / `false`, any letter case         | `TRUE`        |
//! | `{string}` | any segment                               | `hello`       |
//!
//! At every depth a literal child wins over any wildcard, and wildcards are tried in
//! the order the [classifier](classify) hands them out. If a branch dead-ends deeper
//! down, the search backtracks and tries the next candidate, so overlapping templates
//! such as `/a/{digits}/x` and `/a/{string}/y` both stay reachable.
//!
//! The texts of all segments matched through a wildcard are returned as captured
//! arguments, left to right.
//!
//! # Concurrency
//!
//! Registration takes `&mut self` and lookups take `&self`: build the router once, then
//! share it (for example behind an [`Arc`](std::sync::Arc)) across any number of
//! concurrent readers. Each lookup owns its search state.

use thiserror::Error;

mod classify;
mod cursor;
mod node;

pub use classify::{
    Classifier, ClassifierExhausted, ClassifyResult, WildcardKind, classify, default_classifier,
};
pub use node::{Node, NodeId, Trie};

use std::sync::Arc;

use cursor::Cursor;
use node::display_path;

/// Errors raised while building routes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("the endpoint {path} is already registered")]
    AlreadyRegistered { path: String },

    #[error("cannot match {path} against the declared parameters")]
    TemplateMismatch { path: String },
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'r, 'p, T> {
    /// The value registered for the matched template.
    pub value: &'r T,
    /// Texts of the segments resolved through wildcards, in path order.
    pub args: Vec<&'p str>,
}

// The bare `/` route lives under a single empty segment.
const ROOT_SEGMENTS: &[&str] = &[""];

/// A trie of path templates supporting typed-wildcard lookups.
///
/// # Examples
///
/// ```
/// use waypath::router::Router;
///
/// let mut router = Router::new();
/// router.insert(["users", "{digits}"], "user by id").unwrap();
/// router.insert(["users", "{string}"], "user by name").unwrap();
///
/// let hit = router.lookup_path("/users/42").unwrap();
/// assert_eq!(*hit.value, "user by id");
/// assert_eq!(hit.args, ["42"]);
///
/// let hit = router.lookup_path("/users/alice").unwrap();
/// assert_eq!(*hit.value, "user by name");
///
/// assert!(router.lookup_path("/posts").is_none());
/// ```
pub struct Router<T> {
    trie: Trie<T>,
    classifier: Classifier,
    routes: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates an empty router using the default [`classify`] precedence.
    pub fn new() -> Self {
        Self::with_classifier(classify)
    }

    /// Creates an empty router that resolves wildcards through `classifier`.
    pub fn with_classifier<F>(classifier: F) -> Self
    where
        F: Fn(&str, usize) -> ClassifyResult + Send + Sync + 'static,
    {
        Self {
            trie: Trie::new(),
            classifier: Arc::new(classifier),
            routes: 0,
        }
    }

    /// Replaces the classifier used by subsequent lookups.
    ///
    /// The classifier receives a segment and a 1-based attempt index and yields the
    /// next wildcard key to try. It can reorder the built-in families or introduce new
    /// tokens, as long as it eventually reports [`ClassifierExhausted`].
    ///
    /// # Examples
    ///
    /// ```
    /// use std::borrow::Cow;
    /// use waypath::router::{ClassifierExhausted, Router};
    ///
    /// let mut router = Router::new();
    /// router.insert(["{hex}"], "hex").unwrap();
    /// router.set_classifier(|text: &str, attempt: usize| match attempt {
    ///     1 if text.chars().all(|c| c.is_ascii_hexdigit()) => Ok(Some(Cow::Borrowed("{hex}"))),
    ///     1 => Ok(None),
    ///     _ => Err(ClassifierExhausted),
    /// });
    ///
    /// assert_eq!(router.lookup_path("/beef").unwrap().args, ["beef"]);
    /// assert!(router.lookup_path("/xyz").is_none());
    /// ```
    pub fn set_classifier<F>(&mut self, classifier: F)
    where
        F: Fn(&str, usize) -> ClassifyResult + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
    }

    /// Registers `value` under an already-split template.
    ///
    /// Wildcard positions must be spelled with their reserved tokens (see
    /// [`WildcardKind::token`]); everything else is matched literally. An empty segment
    /// list registers the bare `/` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::AlreadyRegistered`] if the exact template, wildcard tokens
    /// included, already holds a value. The earlier registration stays in effect.
    pub fn insert<I, S>(&mut self, segments: I, value: T) -> Result<(), RouteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let owned: Vec<S> = segments.into_iter().collect();
        let mut path: Vec<&str> = owned.iter().map(|segment| segment.as_ref()).collect();
        if path.is_empty() {
            path.extend_from_slice(ROOT_SEGMENTS);
        }

        self.trie.insert(&path, value)?;
        self.routes += 1;
        Ok(())
    }

    /// Registers `value` under a template written as a path, e.g. `/a/{digits}/b`.
    ///
    /// The template is split with the same rules [`lookup_path`](Self::lookup_path)
    /// applies to request paths.
    ///
    /// # Errors
    ///
    /// See [`insert`](Self::insert).
    pub fn insert_path(&mut self, template: &str, value: T) -> Result<(), RouteError> {
        self.insert(split_path(template), value)
    }

    /// Resolves already-split request segments.
    ///
    /// Returns `None` when no registered template matches; this is the ordinary
    /// not-found outcome, never an error. An empty slice is treated as the bare `/`
    /// path.
    pub fn lookup<'r, 'p>(&'r self, segments: &[&'p str]) -> Option<RouteMatch<'r, 'p, T>> {
        let segments: &[&'p str] = if segments.is_empty() {
            ROOT_SEGMENTS
        } else {
            segments
        };

        let (value, args) = Cursor::new(&self.trie, &self.classifier, segments).run()?;
        Some(RouteMatch { value, args })
    }

    /// Resolves a request path such as `/users/42`.
    ///
    /// The path is split on `/` after dropping one leading slash; a trailing slash
    /// yields a final empty segment, so `/users/` and `/users` are distinct routes.
    pub fn lookup_path<'r, 'p>(&'r self, path: &'p str) -> Option<RouteMatch<'r, 'p, T>> {
        let segments: Vec<&'p str> = split_path(path).collect();
        self.lookup(&segments)
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.routes == 0
    }

    /// Read-only access to the underlying trie.
    pub fn trie(&self) -> &Trie<T> {
        &self.trie
    }

    /// Lists every registered template with its value, sorted by template.
    ///
    /// # Examples
    ///
    /// ```
    /// use waypath::router::Router;
    ///
    /// let mut router = Router::new();
    /// router.insert_path("/b/{bool}", 2).unwrap();
    /// router.insert_path("/a", 1).unwrap();
    ///
    /// let routes: Vec<_> = router.routes().into_iter().map(|(path, v)| (path, *v)).collect();
    /// assert_eq!(routes, [("/a".to_string(), 1), ("/b/{bool}".to_string(), 2)]);
    /// ```
    pub fn routes(&self) -> Vec<(String, &T)> {
        let mut found = Vec::with_capacity(self.routes);
        let mut pending: Vec<(NodeId, Vec<&str>)> = vec![(NodeId::ROOT, Vec::new())];

        while let Some((id, path)) = pending.pop() {
            let node = self.trie.node(id);
            if let Some(value) = node.value() {
                found.push((display_path(&path), value));
            }
            for (key, child) in node.children() {
                let mut child_path = path.clone();
                child_path.push(key);
                pending.push((child, child_path));
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }
}

/// Splits a URL path into router segments, dropping one leading `/`.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}
