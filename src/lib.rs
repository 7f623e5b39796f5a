//! # waypath
//!
//! HTTP routing over a path trie with typed wildcards, plus the async HTTP/1.1 plumbing
//! to serve it.
//!
//! Route templates mark variable segments with the kind of text they accept
//! (`{digits}`, `{float}`, `{bool}` or `{string}`). A request path is matched segment by
//! segment: literal text first, then the wildcard kinds the segment classifies as, with
//! backtracking when a branch dead-ends. See [`router`] for the matching rules.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use waypath::{Context, Host, HostConfig, Response, Server, StatusCode, WildcardKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut host = Host::new(HostConfig::default());
//!     host.get("orders/{param}", &[WildcardKind::Digits], |ctx: Context| async move {
//!         let id: u64 = match ctx.parse_arg(0) {
//!             Ok(id) => id,
//!             Err(err) => return Response::new(StatusCode::BadRequest).body(err.to_string()),
//!         };
//!         Response::new(StatusCode::Ok).body(format!("order #{id}"))
//!     })?;
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(host).await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod host;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

pub use context::{ArgError, Context};
pub use host::{Host, HostConfig};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{RouteError, Router, WildcardKind};
pub use server::{Server, ServerError};
