//! Handlers and their erased form.
//!
//! A handler is any `async fn(Request)` whose output converts into a
//! [`Reply`]: `()`, a [`Builder`](crate::Builder), a [`Problem`](crate::Problem)
//! or a `Result` of those. The router stores every handler as the same
//! trait object and only learns what was returned once the reply reaches
//! [`resolve`](crate::resolve::resolve):
//!
//! ```text
//! async fn show(req) -> Result<Builder, Problem>
//!        │ router.get("/users/{id}", show)
//!        ▼
//! BoxedHandler  ── call(req) ──▶ Reply::Builder | Reply::Respond | Reply::Empty
//!                                      │
//!                                      ▼
//!                        resolve(writer, req, reply, None)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::reply::{IntoReply, Reply};
use crate::request::Request;

/// A heap-allocated, type-erased, `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Reply>;

    /// Type name of the wrapped handler, for tracing.
    fn name(&self) -> &'static str;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoReply
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Turns a concrete handler's output into a [`Reply`] behind the erased
/// interface.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Reply> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_reply() })
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<F>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::problem::Problem;
    use http::StatusCode;

    fn request() -> Request {
        Request::from(http::Request::get("/").body("").unwrap())
    }

    #[tokio::test]
    async fn erased_handlers_produce_replies() {
        async fn unit(_req: Request) {}
        async fn builder(_req: Request) -> Builder {
            Builder::new(StatusCode::CREATED)
        }
        async fn problem(_req: Request) -> Result<Builder, Problem> {
            Err(Problem::default())
        }

        assert!(unit.into_boxed_handler().call(request()).await.is_empty());
        assert!(matches!(builder.into_boxed_handler().call(request()).await, Reply::Builder(_)));
        assert!(matches!(problem.into_boxed_handler().call(request()).await, Reply::Respond(_)));
    }

    #[test]
    fn erased_handlers_keep_their_name() {
        async fn list_users(_req: Request) {}

        assert!(list_users.into_boxed_handler().name().ends_with("list_users"));
    }

    #[tokio::test]
    async fn closures_capture_state() {
        let greeting = String::from("hi");
        let handler = move |_req: Request| {
            let greeting = greeting.clone();
            async move { Builder::new(StatusCode::OK).text(greeting) }
        };

        let reply = handler.into_boxed_handler().call(request()).await;
        let Reply::Builder(builder) = reply else { panic!("expected a builder") };
        assert_eq!(builder.headers_ref().first("content-type"), Some("text/plain; charset=utf-8"));
    }
}
