//! A small route table served on `127.0.0.1:8080`.
//!
//! ```text
//! cargo run --example hello_routes
//! curl http://127.0.0.1:8080/orders/42
//! curl http://127.0.0.1:8080/orders/42.5
//! curl http://127.0.0.1:8080/orders/latest
//! curl http://127.0.0.1:8080/api/v1/flags/TRUE
//! curl http://127.0.0.1:8080/api/v1/echo/hello%20there
//! curl http://127.0.0.1:8080/static/
//! ```
//!
//! Set `RUST_LOG=waypath=debug` to watch lookups.

use waypath::middleware::{Recovery, StaticFiles, from_middleware};
use waypath::{Context, Host, HostConfig, Response, Server, StatusCode, WildcardKind};

const CONFIG: &str = r#"{ "lowercase_paths": true, "max_segments": 8 }"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waypath=info".into()),
        )
        .init();

    let config = HostConfig::from_json(CONFIG)?;
    let mut host = Host::with_middleware(config, [from_middleware(Recovery::new())]);

    host.get("", &[], |_ctx: Context| async {
        Response::new(StatusCode::Ok).body("waypath demo")
    })?;

    host.get("orders/{param}", &[WildcardKind::Digits], |ctx: Context| async move {
        match ctx.parse_arg::<i64>(0) {
            Ok(id) => Response::new(StatusCode::Ok).body(format!("order #{id}")),
            Err(err) => Response::new(StatusCode::BadRequest).body(err.to_string()),
        }
    })?;
    host.get("orders/{param}", &[WildcardKind::Float], |ctx: Context| async move {
        Response::new(StatusCode::UnprocessableEntity)
            .body(format!("order ids are whole numbers, got {}", ctx.args()[0]))
    })?;
    host.get("orders/latest", &[], |_ctx: Context| async {
        Response::new(StatusCode::Ok).body("latest order")
    })?;

    host.group("api/v1", Vec::new(), |api| {
        api.get("flags/{param}", &[WildcardKind::Bool], |ctx: Context| async move {
            match ctx.parse_bool_arg(0) {
                Ok(on) => Response::new(StatusCode::Ok)
                    .body(format!("flag is {}", if on { "on" } else { "off" })),
                Err(err) => Response::new(StatusCode::BadRequest).body(err.to_string()),
            }
        })?;
        api.get("echo", &[WildcardKind::String], |ctx: Context| async move {
            Response::new(StatusCode::Ok).body(ctx.args().join(" "))
        })
    })
    .inspect_err(|err| tracing::error!(error = %err, "api/v1 routes not registered"))?;

    host.use_middleware(from_middleware(StaticFiles::new("static", "demos/static")));

    Server::bind("127.0.0.1:8080").await?.serve(host).await?;
    Ok(())
}
