//! Panic recovery for the downstream chain.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::task::Poll;
use std::{future::Future, pin::Pin, sync::Arc};

use tracing::error;

use super::{Middleware, Next};
use crate::{Response, StatusCode, context::Context};

/// Turns a panic into the body sent to the client.
///
/// Called with the panic message and the stack captured where the panic was raised.
/// Returning `None` sends the bare status line text, `500 Internal Server Error`.
pub type RecoveryCollector = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync + 'static>;

/// Middleware that contains panics raised further down the chain.
///
/// The rest of the chain is polled inside [`catch_unwind`](std::panic::catch_unwind).
/// A panic is logged with `tracing::error!`, stack included, and the client receives a
/// `500` response instead of a dropped connection. Panic details reach the client only
/// through a custom collector.
///
/// Stacks are captured by a process-wide panic hook installed the first time a
/// `Recovery` is built. The hook records only panics raised while a `Recovery` is
/// polling and hands every other panic to the hook that was installed before it.
/// Panics inside tasks the handler spawns itself are not caught.
///
/// # Examples
///
/// ```
/// use waypath::middleware::{Recovery, from_middleware};
///
/// let verbose = Recovery::with_collector(|msg, stack| {
///     Some(format!("500 Internal Server Error: {msg}\n\n{stack}"))
/// });
/// let handler = from_middleware(verbose);
/// ```
#[derive(Clone)]
pub struct Recovery {
    collector: RecoveryCollector,
}

impl Default for Recovery {
    fn default() -> Self {
        Self::new()
    }
}

impl Recovery {
    /// Recovery that answers with `500 Internal Server Error` and no details.
    pub fn new() -> Self {
        Self::with_collector(|_, _| None)
    }

    /// Recovery whose response body is produced by `collector`.
    pub fn with_collector<F>(collector: F) -> Self
    where
        F: Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    {
        install_stack_hook();
        Self {
            collector: Arc::new(collector),
        }
    }
}

impl Middleware for Recovery {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let collector = Arc::clone(&self.collector);
        Box::pin(async move {
            let method = ctx.request().method();
            let path = ctx.request().path().to_owned();

            let failure = match CatchPanic::new(next.run(ctx)).await {
                Ok(response) => return response,
                Err(failure) => failure,
            };

            error!(
                %method,
                %path,
                panic = %failure.message,
                stack = %failure.stack,
                "handler panicked"
            );
            let status = StatusCode::InternalServerError;
            let body = collector(&failure.message, &failure.stack)
                .unwrap_or_else(|| status.to_string());
            Response::new(status).body(body)
        })
    }
}

thread_local! {
    // Nesting depth of `CatchPanic` polls on this thread.
    static CATCHING: Cell<usize> = const { Cell::new(0) };
    static LAST_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static STACK_HOOK: Once = Once::new();

fn install_stack_hook() {
    STACK_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CATCHING.with(Cell::get) > 0 {
                let stack = Backtrace::force_capture().to_string();
                LAST_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
            } else {
                previous(info);
            }
        }));
    });
}

struct Failure {
    message: String,
    stack: String,
}

// Polls the downstream chain, turning a panic in any poll into a `Failure`.
struct CatchPanic {
    inner: Pin<Box<dyn Future<Output = Response> + Send>>,
}

impl CatchPanic {
    fn new(inner: impl Future<Output = Response> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl Future for CatchPanic {
    type Output = Result<Response, Failure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let inner = &mut self.inner;
        CATCHING.with(|depth| depth.set(depth.get() + 1));
        let polled = panic::catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll(cx)));
        CATCHING.with(|depth| depth.set(depth.get() - 1));

        match polled {
            Ok(poll) => poll.map(Ok),
            Err(payload) => {
                let stack = LAST_STACK
                    .with(|slot| slot.borrow_mut().take())
                    .unwrap_or_else(|| "stack unavailable".to_owned());
                Poll::Ready(Err(Failure {
                    message: panic_message(payload),
                    stack,
                }))
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_owned(), |message| (*message).to_owned()),
    }
}
