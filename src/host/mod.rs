//! Route registration and request dispatch on top of the [router](crate::router).
//!
//! A [`Host`] owns one [`Router`] per HTTP [`Method`]. Routes are declared as templates
//! with positional placeholders, e.g. `users/{param}/posts`, plus the [`WildcardKind`]
//! each placeholder accepts:
//!
//! ```
//! use waypath::{Context, Host, HostConfig, Response, StatusCode, WildcardKind};
//!
//! let mut host = Host::new(HostConfig::default());
//! host.get("users/{param}", &[WildcardKind::Digits], |ctx: Context| async move {
//!     Response::new(StatusCode::Ok).body(format!("user #{}", ctx.args()[0]))
//! })
//! .unwrap();
//! ```
//!
//! Matching a request runs the middleware captured when the route was registered (the
//! host-wide stack, then any enclosing [`group`](Host::group), then the route's own), and
//! finally the handler with a [`Context`] carrying the captured path arguments.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::Utf8Error;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::middleware::{MiddlewareHandler, Next};
use crate::router::{
    ClassifyResult, Classifier, RouteError, RouteMatch, Router, WildcardKind, default_classifier,
    split_path,
};
use crate::{Method, Request, Response, StatusCode};

mod config;
mod template;

pub use config::{ConfigError, HostConfig};
pub use template::{expand_template, format_path};

/// Type-erased, heap-allocated async handler that turns a [`Context`] into a
/// [`Response`].
///
/// Handlers are shared behind an `Arc` so a single registration can serve any number of
/// concurrent requests. Registration methods accept `impl IntoHandler`; use [`handler`]
/// when a `Handler` value is needed directly.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait through the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Calls the handler, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

/// Erases an async function into a [`Handler`].
pub fn handler(handler: impl IntoHandler) -> Handler {
    Arc::new(move |ctx| handler.call(ctx))
}

/// A registered route: its handler and the middleware chain in front of it.
#[derive(Clone)]
pub struct Endpoint {
    handler: Handler,
    chain: Arc<[MiddlewareHandler]>,
    template: String,
}

impl Endpoint {
    /// The stored template, with wildcard tokens substituted, e.g. `/users/{digits}`.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Number of middleware layers run before the handler.
    pub fn middleware_len(&self) -> usize {
        self.chain.len()
    }

    /// Runs the middleware chain and the handler.
    pub async fn call(&self, ctx: Context) -> Response {
        Next::new(Arc::clone(&self.chain), Arc::clone(&self.handler))
            .run(ctx)
            .await
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("template", &self.template)
            .field("middleware", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Route table plus dispatch for a set of HTTP methods.
///
/// Build it with `&mut self` methods, then share it (the server wraps it in an `Arc`):
/// [`dispatch`](Self::dispatch) only needs `&self`.
pub struct Host {
    routers: HashMap<Method, Router<Endpoint>>,
    config: HostConfig,
    placeholder: String,
    classifier: Classifier,
    middlewares: Vec<MiddlewareHandler>,
    global_chain: Arc<[MiddlewareHandler]>,
    prefixes: Vec<String>,
    scoped: Vec<MiddlewareHandler>,
    errors: Vec<RouteError>,
    not_found: Handler,
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

impl Host {
    /// Creates an empty host.
    ///
    /// An empty `placeholder` in `config` falls back to the default name, `param`.
    pub fn new(mut config: HostConfig) -> Self {
        if config.placeholder.is_empty() {
            config.placeholder = HostConfig::default().placeholder;
        }
        Self {
            routers: HashMap::new(),
            placeholder: config.placeholder_token(),
            config,
            classifier: default_classifier(),
            middlewares: Vec::new(),
            global_chain: Arc::from(Vec::new()),
            prefixes: Vec::new(),
            scoped: Vec::new(),
            errors: Vec::new(),
            not_found: handler(|_ctx: Context| async { Response::reason(StatusCode::NotFound) }),
        }
    }

    /// Creates a host with an initial host-wide middleware stack.
    pub fn with_middleware(
        config: HostConfig,
        middlewares: impl IntoIterator<Item = MiddlewareHandler>,
    ) -> Self {
        let mut host = Self::new(config);
        for middleware in middlewares {
            host.use_middleware(middleware);
        }
        host
    }

    /// The configuration the host was built with.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Appends a host-wide middleware.
    ///
    /// It runs for every route registered after this call, and around the not-found
    /// response.
    pub fn use_middleware(&mut self, middleware: MiddlewareHandler) {
        self.middlewares.push(middleware);
        self.global_chain = Arc::from(self.middlewares.clone());
    }

    /// Replaces the wildcard classifier of every method's router.
    pub fn set_classifier<F>(&mut self, classifier: F)
    where
        F: Fn(&str, usize) -> ClassifyResult + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        for router in self.routers.values_mut() {
            router.set_classifier(shared(&self.classifier));
        }
    }

    /// Registers `handler` for `method` requests matching `template`.
    ///
    /// Each placeholder in the template (`{param}` by default) is replaced, left to
    /// right, by the token of the next entry in `params`; leftover entries become extra
    /// trailing segments. The template is normalized with [`format_path`] and prefixed
    /// by any enclosing [`group`](Self::group).
    ///
    /// # Errors
    ///
    /// - [`RouteError::TemplateMismatch`]: more placeholders than `params`.
    /// - [`RouteError::AlreadyRegistered`]: the resulting route already exists for
    ///   `method`; the first registration stays in effect.
    ///
    /// Errors are also kept in [`errors`](Self::errors).
    pub fn add_endpoint(
        &mut self,
        method: Method,
        template: &str,
        params: &[WildcardKind],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        self.add_endpoint_with(method, template, params, handler, Vec::new())
    }

    /// Like [`add_endpoint`](Self::add_endpoint), with middleware that only this route
    /// runs, after the host-wide and group stacks.
    ///
    /// # Errors
    ///
    /// See [`add_endpoint`](Self::add_endpoint).
    pub fn add_endpoint_with(
        &mut self,
        method: Method,
        template: &str,
        params: &[WildcardKind],
        handler: impl IntoHandler,
        middlewares: Vec<MiddlewareHandler>,
    ) -> Result<(), RouteError> {
        let endpoint = self::handler(handler);
        let result = self.register(method, template, params, endpoint, middlewares);
        if let Err(err) = &result {
            warn!(%method, template, error = %err, "route rejected");
            self.errors.push(err.clone());
        }
        result
    }

    /// Registers a `GET` route; see [`add_endpoint`](Self::add_endpoint).
    ///
    /// # Errors
    ///
    /// See [`add_endpoint`](Self::add_endpoint).
    pub fn get(
        &mut self,
        template: &str,
        params: &[WildcardKind],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        self.add_endpoint(Method::Get, template, params, handler)
    }

    /// Registers a `POST` route; see [`add_endpoint`](Self::add_endpoint).
    ///
    /// # Errors
    ///
    /// See [`add_endpoint`](Self::add_endpoint).
    pub fn post(
        &mut self,
        template: &str,
        params: &[WildcardKind],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        self.add_endpoint(Method::Post, template, params, handler)
    }

    /// Registers a `PUT` route; see [`add_endpoint`](Self::add_endpoint).
    ///
    /// # Errors
    ///
    /// See [`add_endpoint`](Self::add_endpoint).
    pub fn put(
        &mut self,
        template: &str,
        params: &[WildcardKind],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        self.add_endpoint(Method::Put, template, params, handler)
    }

    /// Registers a `DELETE` route; see [`add_endpoint`](Self::add_endpoint).
    ///
    /// # Errors
    ///
    /// See [`add_endpoint`](Self::add_endpoint).
    pub fn delete(
        &mut self,
        template: &str,
        params: &[WildcardKind],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        self.add_endpoint(Method::Delete, template, params, handler)
    }

    /// Registers a `PATCH` route; see [`add_endpoint`](Self::add_endpoint).
    ///
    /// # Errors
    ///
    /// See [`add_endpoint`](Self::add_endpoint).
    pub fn patch(
        &mut self,
        template: &str,
        params: &[WildcardKind],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        self.add_endpoint(Method::Patch, template, params, handler)
    }

    /// Registers an `OPTIONS` route; see [`add_endpoint`](Self::add_endpoint).
    ///
    /// # Errors
    ///
    /// See [`add_endpoint`](Self::add_endpoint).
    pub fn options(
        &mut self,
        template: &str,
        params: &[WildcardKind],
        handler: impl IntoHandler,
    ) -> Result<(), RouteError> {
        self.add_endpoint(Method::Options, template, params, handler)
    }

    /// Registers the routes declared in `routes` under `prefix`, each running
    /// `middlewares` after the host-wide stack.
    ///
    /// Groups nest; the prefix and middleware are dropped again when `routes` returns,
    /// and whatever `routes` returns is handed back, so registration errors can be
    /// propagated with `?`.
    ///
    /// # Examples
    ///
    /// ```
    /// use waypath::{Context, Host, Response, RouteError, StatusCode, WildcardKind};
    ///
    /// let mut host = Host::default();
    /// host.group("api/v1", Vec::new(), |api| {
    ///     api.get("items/{param}", &[WildcardKind::Digits], |_ctx: Context| async {
    ///         Response::new(StatusCode::Ok)
    ///     })
    /// })?;
    /// assert_eq!(host.route_table()[0].1, "/api/v1/items/{digits}");
    /// # Ok::<(), RouteError>(())
    /// ```
    pub fn group<F, R>(&mut self, prefix: &str, middlewares: Vec<MiddlewareHandler>, routes: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let scoped_len = self.scoped.len();
        self.prefixes.push(format_path(prefix, false));
        self.scoped.extend(middlewares);

        let output = routes(self);

        self.prefixes.pop();
        self.scoped.truncate(scoped_len);
        output
    }

    /// Every registration error seen so far, in order.
    pub fn errors(&self) -> &[RouteError] {
        &self.errors
    }

    /// All registered routes as `(method, template)`, ordered by method then template.
    pub fn route_table(&self) -> Vec<(Method, String)> {
        Method::ALL
            .iter()
            .filter_map(|method| self.routers.get(method).map(|router| (*method, router)))
            .flat_map(|(method, router)| {
                router
                    .routes()
                    .into_iter()
                    .map(move |(_, endpoint)| (method, endpoint.template.clone()))
            })
            .collect()
    }

    /// Looks `path` up in the router for `method`, without running anything.
    ///
    /// The path is used as given, already decoded; percent-decoding, lowercasing and
    /// the segment limit only apply in [`dispatch`](Self::dispatch).
    pub fn resolve<'h, 'p>(
        &'h self,
        method: Method,
        path: &'p str,
    ) -> Option<RouteMatch<'h, 'p, Endpoint>> {
        self.routers.get(&method)?.lookup_path(path)
    }

    /// Routes `request` to its endpoint and returns the response.
    ///
    /// Each path segment is percent-decoded on its own before the lookup, so captured
    /// arguments arrive decoded and an encoded `%2F` never splits a segment; the request
    /// itself keeps the raw path. Segments that do not decode to UTF-8 get
    /// `400 Bad Request`, and paths with more than `max_segments` segments get
    /// `414 URI Too Long`, both without a lookup. Unmatched requests get
    /// `404 Not Found`, wrapped in the host-wide middleware.
    pub async fn dispatch(&self, request: Request) -> Response {
        let method = request.method();

        let matched = {
            let decoded = match decode_segments(request.path(), self.config.lowercase_paths) {
                Ok(decoded) => decoded,
                Err(err) => {
                    debug!(%method, path = request.path(), error = %err, "undecodable path");
                    return Response::reason(StatusCode::BadRequest);
                }
            };
            if decoded.len() > self.config.max_segments {
                debug!(
                    %method,
                    path = request.path(),
                    limit = self.config.max_segments,
                    "too many path segments"
                );
                return Response::reason(StatusCode::UriTooLong);
            }

            let segments: Vec<&str> = decoded.iter().map(|segment| &**segment).collect();
            self.routers
                .get(&method)
                .and_then(|router| router.lookup(&segments))
                .map(|found| {
                    let args: Vec<String> = found.args.iter().map(|arg| (*arg).to_owned()).collect();
                    (found.value, args)
                })
        };

        let Some((endpoint, args)) = matched else {
            debug!(%method, path = request.path(), "no route matched");
            let next = Next::new(Arc::clone(&self.global_chain), Arc::clone(&self.not_found));
            return next.run(Context::new(request)).await;
        };

        debug!(%method, path = request.path(), route = endpoint.template(), "route matched");
        endpoint.call(Context::with_args(request, args)).await
    }

    fn register(
        &mut self,
        method: Method,
        template: &str,
        params: &[WildcardKind],
        handler: Handler,
        middlewares: Vec<MiddlewareHandler>,
    ) -> Result<(), RouteError> {
        let mut full = String::new();
        for prefix in self.prefixes.iter().filter(|prefix| !prefix.is_empty()) {
            full.push('/');
            full.push_str(prefix);
        }
        if !template.is_empty() {
            full.push('/');
            full.push_str(template);
        }

        let mut path = expand_template(&full, &self.placeholder, params)?;
        if self.config.lowercase_paths {
            path = path.to_lowercase();
        }

        let chain: Vec<MiddlewareHandler> = self
            .middlewares
            .iter()
            .chain(&self.scoped)
            .chain(&middlewares)
            .cloned()
            .collect();
        let endpoint = Endpoint {
            handler,
            chain: Arc::from(chain),
            template: path.clone(),
        };

        let classifier = &self.classifier;
        self.routers
            .entry(method)
            .or_insert_with(|| Router::with_classifier(shared(classifier)))
            .insert_path(&path, endpoint)?;

        if self.config.report_routes {
            info!(%method, route = %path, "route registered");
        }
        Ok(())
    }
}

// Splits a raw request path and percent-decodes every segment separately.
fn decode_segments(path: &str, lowercase: bool) -> Result<Vec<Cow<'_, str>>, Utf8Error> {
    split_path(path)
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8()?;
            Ok(if lowercase {
                Cow::Owned(decoded.to_lowercase())
            } else {
                decoded
            })
        })
        .collect()
}

// Adapts the shared classifier to the closure form routers take.
fn shared(
    classifier: &Classifier,
) -> impl Fn(&str, usize) -> ClassifyResult + Send + Sync + 'static {
    let classifier = Arc::clone(classifier);
    move |text: &str, attempt: usize| classifier(text, attempt)
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::sync::Mutex;

    use super::*;
    use crate::middleware::{Middleware, Recovery, from_middleware};
    use crate::router::ClassifierExhausted;
    use crate::router::WildcardKind::{Bool, Digits, Float, String as Str};

    fn quiet() -> HostConfig {
        HostConfig {
            report_routes: false,
            ..HostConfig::default()
        }
    }

    fn echo(name: &'static str) -> impl IntoHandler {
        move |ctx: Context| async move {
            Response::new(StatusCode::Ok).body(format!("{name}:{}", ctx.args().join(",")))
        }
    }

    async fn body(host: &Host, method: Method, path: &str) -> (StatusCode, String) {
        let response = host.dispatch(Request::new(method, path)).await;
        let text = String::from_utf8_lossy(response.payload()).into_owned();
        (response.status(), text)
    }

    struct Trace {
        tag: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Trace {
        fn handle(
            &self,
            ctx: Context,
            next: Next,
        ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            let (tag, seen) = (self.tag, Arc::clone(&self.seen));
            Box::pin(async move {
                seen.lock().unwrap().push(tag);
                next.run(ctx).await
            })
        }
    }

    fn trace(tag: &'static str, seen: &Arc<Mutex<Vec<&'static str>>>) -> MiddlewareHandler {
        from_middleware(Trace {
            tag,
            seen: Arc::clone(seen),
        })
    }

    // ── Registration ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn typed_routes_dispatch_by_kind() {
        let mut host = Host::new(quiet());
        host.get("items/{param}", &[Digits], echo("digits")).unwrap();
        host.get("items/{param}", &[Float], echo("float")).unwrap();
        host.get("items/{param}", &[Bool], echo("bool")).unwrap();
        host.get("items/{param}", &[Str], echo("string")).unwrap();

        assert_eq!(body(&host, Method::Get, "/items/7").await.1, "digits:7");
        assert_eq!(body(&host, Method::Get, "/items/7.5").await.1, "float:7.5");
        assert_eq!(body(&host, Method::Get, "/items/False").await.1, "bool:False");
        assert_eq!(body(&host, Method::Get, "/items/x").await.1, "string:x");
    }

    #[tokio::test]
    async fn methods_have_separate_tables() {
        let mut host = Host::new(quiet());
        host.get("thing", &[], echo("get")).unwrap();
        host.post("thing", &[], echo("post")).unwrap();

        assert_eq!(body(&host, Method::Get, "/thing").await.1, "get:");
        assert_eq!(body(&host, Method::Post, "/thing").await.1, "post:");
        assert_eq!(
            body(&host, Method::Delete, "/thing").await.0,
            StatusCode::NotFound
        );
    }

    #[test]
    fn duplicates_and_mismatches_are_collected() {
        let mut host = Host::new(quiet());
        host.get("a/{param}", &[Digits], echo("first")).unwrap();

        let dup = host.get("/a//{param}", &[Digits], echo("second"));
        assert_eq!(
            dup,
            Err(RouteError::AlreadyRegistered {
                path: "/a/{digits}".into()
            })
        );
        let mismatch = host.put("b/{param}/{param}", &[Bool], echo("x"));
        assert!(matches!(mismatch, Err(RouteError::TemplateMismatch { .. })));

        assert_eq!(host.errors().len(), 2);
        assert_eq!(host.route_table(), [(Method::Get, "/a/{digits}".to_owned())]);
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let mut host = Host::new(quiet());
        host.get("a", &[], echo("first")).unwrap();
        assert!(host.get("a", &[], echo("second")).is_err());
        assert_eq!(body(&host, Method::Get, "/a").await.1, "first:");
    }

    #[test]
    fn route_table_is_ordered() {
        let mut host = Host::new(quiet());
        host.post("z", &[], echo("z")).unwrap();
        host.get("b", &[Float], echo("b")).unwrap();
        host.get("a", &[], echo("a")).unwrap();

        assert_eq!(
            host.route_table(),
            [
                (Method::Get, "/a".to_owned()),
                (Method::Get, "/b/{float}".to_owned()),
                (Method::Post, "/z".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn root_and_trailing_slash_routes() {
        let mut host = Host::new(quiet());
        host.get("", &[], echo("root")).unwrap();
        host.get("users/", &[], echo("slash")).unwrap();
        host.get("users", &[], echo("bare")).unwrap();

        assert_eq!(body(&host, Method::Get, "/").await.1, "root:");
        assert_eq!(body(&host, Method::Get, "/users/").await.1, "slash:");
        assert_eq!(body(&host, Method::Get, "/users").await.1, "bare:");
    }

    #[tokio::test]
    async fn custom_placeholder_name() {
        let config = HostConfig {
            placeholder: "id".into(),
            ..quiet()
        };
        let mut host = Host::new(config);
        host.get("users/{id}", &[Digits], echo("user")).unwrap();
        assert_eq!(body(&host, Method::Get, "/users/3").await.1, "user:3");
    }

    #[tokio::test]
    async fn placeholder_may_share_a_token_name() {
        let config = HostConfig {
            placeholder: "digits".into(),
            ..quiet()
        };
        let mut host = Host::new(config);
        host.get("users/{digits}", &[Digits], echo("user")).unwrap();
        host.get("tags/{digits}/{digits}", &[Str, Bool], echo("tag")).unwrap();

        assert!(host.errors().is_empty());
        assert_eq!(body(&host, Method::Get, "/users/3").await.1, "user:3");
        assert_eq!(body(&host, Method::Get, "/tags/x/true").await.1, "tag:x,true");
    }

    #[test]
    fn empty_placeholder_falls_back_to_default() {
        let host = Host::new(HostConfig {
            placeholder: String::new(),
            ..quiet()
        });
        assert_eq!(host.config().placeholder, "param");
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn backtracking_reaches_deeper_routes() {
        let mut host = Host::new(quiet());
        host.get("a/{param}/x", &[Digits], echo("digits")).unwrap();
        host.get("a/{param}/y", &[Str], echo("string")).unwrap();

        assert_eq!(body(&host, Method::Get, "/a/5/x").await.1, "digits:5");
        assert_eq!(body(&host, Method::Get, "/a/5/y").await.1, "string:5");
        assert_eq!(body(&host, Method::Get, "/a/5/z").await.0, StatusCode::NotFound);
    }

    #[tokio::test]
    async fn lowercase_paths_applies_to_both_sides() {
        let config = HostConfig {
            lowercase_paths: true,
            ..quiet()
        };
        let mut host = Host::new(config);
        host.get("Users/{param}", &[Str], echo("user")).unwrap();

        assert_eq!(host.route_table()[0].1, "/users/{string}");
        assert_eq!(body(&host, Method::Get, "/USERS/Ann").await.1, "user:ann");
    }

    #[tokio::test]
    async fn segment_limit_rejects_long_paths() {
        let config = HostConfig {
            max_segments: 2,
            ..quiet()
        };
        let mut host = Host::new(config);
        host.get("a/b", &[], echo("ab")).unwrap();

        assert_eq!(body(&host, Method::Get, "/a/b").await.0, StatusCode::Ok);
        assert_eq!(
            body(&host, Method::Get, "/a/b/c").await.0,
            StatusCode::UriTooLong
        );
    }

    #[tokio::test]
    async fn not_found_has_reason_body() {
        let host = Host::new(quiet());
        assert_eq!(
            body(&host, Method::Get, "/missing").await,
            (StatusCode::NotFound, "Not Found".to_owned())
        );
    }

    #[tokio::test]
    async fn query_string_does_not_affect_matching() {
        let mut host = Host::new(quiet());
        host.get("search/{param}", &[Str], echo("s")).unwrap();
        assert_eq!(body(&host, Method::Get, "/search/cats?page=2").await.1, "s:cats");
    }

    #[tokio::test]
    async fn segments_are_percent_decoded_before_lookup() {
        let mut host = Host::new(quiet());
        host.get("search/{param}", &[Str], echo("s")).unwrap();
        host.get("flag/{param}", &[Bool], echo("flag")).unwrap();
        host.get("caf\u{e9}", &[], echo("cafe")).unwrap();

        assert_eq!(
            body(&host, Method::Get, "/search/hello%20world").await.1,
            "s:hello world"
        );
        assert_eq!(body(&host, Method::Get, "/flag/tru%65").await.1, "flag:true");
        assert_eq!(body(&host, Method::Get, "/caf%C3%A9").await.1, "cafe:");
    }

    #[tokio::test]
    async fn encoded_slash_stays_in_its_segment() {
        let mut host = Host::new(quiet());
        host.get("files/{param}", &[Str], echo("file")).unwrap();

        assert_eq!(body(&host, Method::Get, "/files/a%2Fb").await.1, "file:a/b");
        assert_eq!(
            body(&host, Method::Get, "/files/a/b").await.0,
            StatusCode::NotFound
        );
    }

    #[tokio::test]
    async fn request_keeps_the_raw_path() {
        let mut host = Host::new(quiet());
        host.get("search/{param}", &[Str], |ctx: Context| async move {
            Response::new(StatusCode::Ok).body(ctx.request().path().to_owned())
        })
        .unwrap();

        assert_eq!(
            body(&host, Method::Get, "/search/a%20b").await.1,
            "/search/a%20b"
        );
    }

    #[tokio::test]
    async fn undecodable_segment_is_400() {
        let mut host = Host::new(quiet());
        host.get("search/{param}", &[Str], echo("s")).unwrap();

        assert_eq!(
            body(&host, Method::Get, "/search/%FF").await,
            (StatusCode::BadRequest, "Bad Request".to_owned())
        );
    }

    #[tokio::test]
    async fn custom_classifier_applies_to_existing_routers() {
        let mut host = Host::new(quiet());
        host.get("{hex}", &[], echo("hex")).unwrap();
        host.set_classifier(|text: &str, attempt: usize| match attempt {
            1 if text.chars().all(|c| c.is_ascii_hexdigit()) => Ok(Some(Cow::Borrowed("{hex}"))),
            1 => Ok(None),
            _ => Err(ClassifierExhausted),
        });

        assert_eq!(body(&host, Method::Get, "/c0ffee").await.1, "hex:c0ffee");
        assert_eq!(body(&host, Method::Get, "/zz").await.0, StatusCode::NotFound);
    }

    // ── Middleware and groups ─────────────────────────────────────────────────

    #[tokio::test]
    async fn middleware_runs_global_then_group_then_route() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut host = Host::with_middleware(quiet(), [trace("global", &seen)]);

        host.group("api", vec![trace("group", &seen)], |api| {
            api.group("v1", vec![trace("inner", &seen)], |v1| {
                v1.add_endpoint_with(
                    Method::Get,
                    "ping",
                    &[],
                    echo("ping"),
                    vec![trace("route", &seen)],
                )
                .unwrap();
            });
            api.get("health", &[], echo("health")).unwrap();
        });
        host.get("plain", &[], echo("plain")).unwrap();

        assert_eq!(body(&host, Method::Get, "/api/v1/ping").await.1, "ping:");
        assert_eq!(*seen.lock().unwrap(), ["global", "group", "inner", "route"]);

        seen.lock().unwrap().clear();
        assert_eq!(body(&host, Method::Get, "/api/health").await.1, "health:");
        assert_eq!(*seen.lock().unwrap(), ["global", "group"]);

        seen.lock().unwrap().clear();
        assert_eq!(body(&host, Method::Get, "/plain").await.1, "plain:");
        assert_eq!(*seen.lock().unwrap(), ["global"]);
    }

    #[tokio::test]
    async fn not_found_runs_global_middleware() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut host = Host::new(quiet());
        host.use_middleware(trace("global", &seen));

        assert_eq!(body(&host, Method::Get, "/nope").await.0, StatusCode::NotFound);
        assert_eq!(*seen.lock().unwrap(), ["global"]);
    }

    #[test]
    fn middleware_applies_to_later_routes_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut host = Host::new(quiet());
        host.get("before", &[], echo("b")).unwrap();
        host.use_middleware(trace("late", &seen));
        host.get("after", &[], echo("a")).unwrap();

        let before = host.resolve(Method::Get, "/before").unwrap();
        let after = host.resolve(Method::Get, "/after").unwrap();
        assert_eq!(before.value.middleware_len(), 0);
        assert_eq!(after.value.middleware_len(), 1);
    }

    #[tokio::test]
    async fn recovery_turns_panics_into_500() {
        let mut host = Host::with_middleware(quiet(), [from_middleware(Recovery::new())]);
        host.get("boom/{param}", &[Digits], |ctx: Context| async move {
            if ctx.parse_arg::<i64>(0) == Ok(0) {
                panic!("division by zero");
            }
            Response::new(StatusCode::Ok)
        })
        .unwrap();

        assert_eq!(body(&host, Method::Get, "/boom/1").await.0, StatusCode::Ok);
        assert_eq!(
            body(&host, Method::Get, "/boom/0").await,
            (
                StatusCode::InternalServerError,
                "500 Internal Server Error".to_owned()
            )
        );
    }

    #[test]
    fn group_prefix_is_restored() {
        let mut host = Host::new(quiet());
        host.group("/admin/", Vec::new(), |admin| {
            admin.get("", &[], echo("index")).unwrap();
            admin.get("users/{param}", &[Digits], echo("user")).unwrap();
        });
        host.get("users", &[], echo("users")).unwrap();

        let templates: Vec<_> = host.route_table().into_iter().map(|(_, t)| t).collect();
        assert_eq!(templates, ["/admin", "/admin/users/{digits}", "/users"]);
    }

    #[test]
    fn group_hands_back_the_closure_result() {
        let mut host = Host::new(quiet());
        let outcome = host.group("api", Vec::new(), |api| -> Result<(), RouteError> {
            api.get("items", &[], echo("items"))?;
            api.get("items", &[], echo("again"))?;
            api.get("never", &[], echo("never"))?;
            Ok(())
        });

        assert!(matches!(outcome, Err(RouteError::AlreadyRegistered { .. })));
        assert!(host.resolve(Method::Get, "/api/never").is_none());
        host.get("after", &[], echo("after")).unwrap();
        assert!(host.resolve(Method::Get, "/after").is_some());
    }
}
