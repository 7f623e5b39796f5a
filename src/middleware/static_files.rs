//! Serving files from a folder for requests no route answered.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::{future::Future, pin::Pin, sync::Arc};

use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use super::{Middleware, Next};
use crate::host::format_path;
use crate::{Method, Response, StatusCode, context::Context};

/// Middleware that answers unmatched `GET` requests from a folder on disk.
///
/// The rest of the chain always runs first. Only when it replies `404 Not Found` to a
/// `GET` whose path starts with the mount prefix is the prefix stripped and the
/// remainder looked up under the folder. A path ending in `/` serves that directory's
/// `index.html`, or an HTML listing of the directory when listing is enabled. Paths
/// with a `..` segment are never served; neither are files the folder does not hold,
/// in which case the original `404` goes out unchanged.
///
/// Install it host-wide so it also wraps the not-found response.
///
/// # Examples
///
/// ```
/// use waypath::middleware::{StaticFiles, from_middleware};
/// use waypath::{Host, HostConfig};
///
/// let assets = StaticFiles::new("assets", "./public").list_directories(true);
/// let host = Host::with_middleware(HostConfig::default(), [from_middleware(assets)]);
/// ```
#[derive(Debug, Clone)]
pub struct StaticFiles {
    mount: Arc<str>,
    folder: Arc<Path>,
    list_directories: bool,
}

impl StaticFiles {
    /// Serves `folder` under the URL prefix `mount`.
    ///
    /// `mount` is normalized like a route template and always starts and ends with
    /// `/`; an empty mount serves from the root.
    pub fn new(mount: &str, folder: impl Into<PathBuf>) -> Self {
        let mount = match format_path(mount, false) {
            trimmed if trimmed.is_empty() => "/".to_owned(),
            trimmed => format!("/{trimmed}/"),
        };
        let folder: PathBuf = folder.into();
        Self {
            mount: Arc::from(mount),
            folder: Arc::from(folder),
            list_directories: false,
        }
    }

    /// Lists directory contents for paths ending in `/` instead of serving `index.html`.
    #[must_use]
    pub fn list_directories(mut self, enabled: bool) -> Self {
        self.list_directories = enabled;
        self
    }

    /// The normalized URL prefix, e.g. `/assets/`.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Maps a raw request path to a file or directory below the folder.
    ///
    /// Returns `None` outside the mount, for undecodable segments, and for any `.` or
    /// `..` segment or a decoded segment containing a separator.
    fn locate(&self, path: &str) -> Option<PathBuf> {
        let relative = path.strip_prefix(&*self.mount)?;
        let mut located = self.folder.to_path_buf();
        for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
            let decoded = percent_decode_str(segment).decode_utf8().ok()?;
            if decoded == "." || decoded == ".." || decoded.contains(['/', '\\', '\0']) {
                return None;
            }
            located.push(&*decoded);
        }
        Some(located)
    }

    async fn serve(&self, path: &str) -> Option<Response> {
        let Some(mut located) = self.locate(path) else {
            debug!(path, "path not servable from static folder");
            return None;
        };

        let wants_directory = path.ends_with('/');
        if wants_directory && self.list_directories {
            return read_listing(&located, path).await;
        }
        if wants_directory {
            located.push("index.html");
        }

        let contents = match tokio::fs::metadata(&located).await {
            Ok(meta) if meta.is_file() => tokio::fs::read(&located).await,
            Ok(_) => return None,
            Err(err) => Err(err),
        };
        match contents {
            Ok(bytes) => {
                debug!(path, file = %located.display(), "serving static file");
                Some(
                    Response::new(StatusCode::Ok)
                        .header("Content-Type", content_type(&located))
                        .body_bytes(bytes),
                )
            }
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path, file = %located.display(), error = %err, "static file unreadable");
                Some(Response::reason(StatusCode::InternalServerError))
            }
        }
    }
}

impl Middleware for StaticFiles {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let files = self.clone();
        Box::pin(async move {
            let method = ctx.request().method();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;
            if method != Method::Get || response.status() != StatusCode::NotFound {
                return response;
            }
            files.serve(&path).await.unwrap_or(response)
        })
    }
}

async fn read_listing(dir: &Path, path: &str) -> Option<Response> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!(path, error = %err, "no directory to list");
            return None;
        }
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
                    name.push('/');
                }
                names.push(name);
            }
            Ok(None) => break,
            Err(err) => {
                warn!(path, error = %err, "directory listing interrupted");
                return Some(Response::reason(StatusCode::InternalServerError));
            }
        }
    }
    names.sort();

    let mut html = String::from("<!doctype html>\n<pre>\n");
    for name in &names {
        let name = escape_html(name);
        html.push_str(&format!("<a href=\"{name}\">{name}</a>\n"));
    }
    html.push_str("</pre>\n");
    Some(
        Response::new(StatusCode::Ok)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(html),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::host::{Handler, handler};
    use crate::middleware::{MiddlewareHandler, from_middleware};
    use crate::{Host, HostConfig, Request, WildcardKind};

    fn site() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("app.js"), "run()").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs").join("read me.txt"), "notes").unwrap();
        dir
    }

    fn missing() -> Handler {
        handler(|_ctx: Context| async { Response::reason(StatusCode::NotFound) })
    }

    async fn run(files: StaticFiles, endpoint: Handler, method: Method, path: &str) -> Response {
        let chain: Vec<MiddlewareHandler> = vec![from_middleware(files)];
        Next::new(Arc::from(chain), endpoint)
            .run(Context::new(Request::new(method, path)))
            .await
    }

    async fn get(files: StaticFiles, path: &str) -> Response {
        run(files, missing(), Method::Get, path).await
    }

    #[test]
    fn mount_is_normalized() {
        assert_eq!(StaticFiles::new("assets", ".").mount(), "/assets/");
        assert_eq!(StaticFiles::new("//a\\b/", ".").mount(), "/a/b/");
        assert_eq!(StaticFiles::new("", ".").mount(), "/");
    }

    #[tokio::test]
    async fn serves_files_under_the_mount() {
        let dir = site();
        let response = get(StaticFiles::new("static", dir.path()), "/static/app.js").await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.payload(), b"run()");
        assert_eq!(
            response.headers().get("content-type"),
            Some("text/javascript; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn encoded_names_are_decoded() {
        let dir = site();
        let response = get(StaticFiles::new("static", dir.path()), "/static/docs/read%20me.txt").await;
        assert_eq!(response.payload(), b"notes");
    }

    #[tokio::test]
    async fn trailing_slash_serves_index() {
        let dir = site();
        let response = get(StaticFiles::new("static", dir.path()), "/static/").await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.payload(), b"<h1>home</h1>");
        assert_eq!(
            response.headers().get("content-type"),
            Some("text/html; charset=utf-8")
        );

        // No index.html in docs/, so the 404 stands.
        let response = get(StaticFiles::new("static", dir.path()), "/static/docs/").await;
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn listing_replaces_index_when_enabled() {
        let dir = site();
        let files = StaticFiles::new("static", dir.path()).list_directories(true);
        let response = get(files, "/static/").await;
        let body = String::from_utf8(response.payload().to_vec()).unwrap();
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(body.contains("<a href=\"app.js\">app.js</a>"));
        assert!(body.contains("<a href=\"docs/\">docs/</a>"));
        assert!(body.contains("<a href=\"index.html\">index.html</a>"));
    }

    #[tokio::test]
    async fn traversal_is_refused() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("secret.txt"), "hidden").unwrap();
        let public = root.path().join("public");
        fs::create_dir(&public).unwrap();

        for path in [
            "/static/../secret.txt",
            "/static/%2E%2E/secret.txt",
            "/static/..%2Fsecret.txt",
            "/static/./../secret.txt",
        ] {
            let response = get(StaticFiles::new("static", &public), path).await;
            assert_eq!(response.status(), StatusCode::NotFound, "{path}");
            assert_eq!(response.payload(), b"Not Found", "{path}");
        }
    }

    #[tokio::test]
    async fn missing_files_and_other_prefixes_keep_the_404() {
        let dir = site();
        let files = StaticFiles::new("static", dir.path());
        assert_eq!(get(files.clone(), "/static/nope.css").await.status(), StatusCode::NotFound);
        assert_eq!(get(files.clone(), "/app.js").await.status(), StatusCode::NotFound);
        // A directory without a trailing slash is not a file.
        assert_eq!(get(files, "/static/docs").await.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn matched_routes_and_other_methods_pass_through() {
        let dir = site();
        let files = StaticFiles::new("static", dir.path());

        let routed = handler(|_ctx: Context| async { Response::new(StatusCode::Ok).body("route") });
        let response = run(files.clone(), routed, Method::Get, "/static/app.js").await;
        assert_eq!(response.payload(), b"route");

        let response = run(files, missing(), Method::Post, "/static/app.js").await;
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn host_falls_back_to_files_for_unrouted_paths() {
        let dir = site();
        let mut host = Host::with_middleware(
            HostConfig {
                report_routes: false,
                ..HostConfig::default()
            },
            [from_middleware(StaticFiles::new("static", dir.path()))],
        );
        host.get("static/{param}", &[WildcardKind::Digits], |_ctx: Context| async {
            Response::new(StatusCode::Ok).body("numbered")
        })
        .unwrap();

        let response = host.dispatch(Request::new(Method::Get, "/static/7")).await;
        assert_eq!(response.payload(), b"numbered");
        let response = host.dispatch(Request::new(Method::Get, "/static/app.js")).await;
        assert_eq!(response.payload(), b"run()");
    }

    #[test]
    fn content_types_follow_the_extension() {
        assert_eq!(content_type(Path::new("a/b.CSS")), "text/css; charset=utf-8");
        assert_eq!(content_type(Path::new("logo.png")), "image/png");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn listing_names_are_escaped() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
