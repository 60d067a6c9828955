//! # tsuki
//!
//! Response resolution for hyper services.
//!
//! Handlers return values, not responses: a [`Builder`], a [`Problem`], `()`,
//! or any `Result` of those with an ordinary error. tsuki resolves that value
//! into exactly one write on the transport, with predictable merge rules when
//! errors nest and a per-request [`Hook`] that hears about every `5xx`.
//!
//! ## What it does
//!
//! - Fluent, copy-on-write response [`Builder`] with body, reader, stream,
//!   server-sent events and custom-writer payloads
//! - RFC 9457 [`Problem`] details with content negotiation and per-request
//!   [`ProblemControls`]
//! - Server-error [`Hook`] with continuation-passing subscribers
//! - Middleware: panic recovery, error logging, authorization, validation
//! - Radix-tree routing via [`matchit`], hyper 1 server, graceful shutdown
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use tsuki::middleware::{Logger, Recover};
//! use tsuki::{Builder, Problem, Reply, Request, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsuki::Error> {
//!     let app = Router::new()
//!         .layer(Recover::new())
//!         .layer(Logger)
//!         .get("/users/{id}", get_user)
//!         .post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Result<Builder, Problem> {
//!     match req.param("id") {
//!         Some("42") => Ok(Builder::new(StatusCode::OK).json(&serde_json::json!({ "id": 42 }))),
//!         _ => Err(Problem::new(std::fmt::Error, StatusCode::NOT_FOUND)),
//!     }
//! }
//!
//! async fn create_user(req: Request) -> Result<Builder, Reply> {
//!     let user: serde_json::Value = req.json()?; // bad JSON → 500 problem
//!     Ok(Builder::new(StatusCode::CREATED).header("location", "/users/99").json(&user))
//! }
//! ```

mod builder;
mod error;
mod headers;
mod hook;
mod reply;
mod request;
mod router;
mod server;
mod writer;

pub mod accept;
pub mod event;
pub mod handler;
pub mod middleware;
pub mod problem;
pub mod resolve;
pub mod sse;
pub mod status;
pub mod testing;

pub use builder::{Body, Builder, ContentType, Payload, WriteRoutine, failed, response};
pub use error::Error;
pub use handler::Handler;
pub use headers::Headers;
pub use hook::{ErrorNext, Hook, ServerError, ServerErrorKind};
pub use problem::{Problem, ProblemControls};
pub use reply::{BoxError, IntoReply, RawResponder, Reply, Responder, SharedError};
pub use request::Request;
pub use resolve::resolve;
pub use router::Router;
pub use server::Server;
pub use writer::ResponseWriter;
