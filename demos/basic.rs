//! Minimal tsuki example: JSON endpoints, problems, streaming and SSE.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -H 'accept: application/json' http://localhost:3000/users/7
//!   curl -i -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -i -X POST http://localhost:3000/users -d 'not json'
//!   curl -N http://localhost:3000/ticks
//!   curl -i http://localhost:3000/admin/stats

use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use tsuki::middleware::{Authorize, Logger, Problems, Recover};
use tsuki::{BoxError, Builder, Problem, ProblemControls, Reply, Request, Router, Server, sse};

#[derive(Debug, Deserialize, Serialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Debug, thiserror::Error)]
#[error("user {0} does not exist")]
struct UnknownUser(String);

#[tokio::main]
async fn main() -> Result<(), tsuki::Error> {
    tracing_subscriber::fmt::init();

    let controls = ProblemControls::new()
        .kind(|p, _| format!("https://errors.example.com/{}", p.status));

    let app = Router::new()
        .layer(Recover::new())
        .layer(Logger)
        .layer(Problems::new(controls))
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .delete("/users/{id}", delete_user)
        .get("/ticks", ticks)
        .group("/admin", |admin| {
            admin
                .layer(Authorize::new(admin_only))
                .get("/stats", stats)
        });

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// GET /users/{id}: 200 JSON, or a 404 problem.
async fn get_user(req: Request) -> Result<Builder, Problem> {
    let id = req.param("id").unwrap_or_default();
    if id != "42" {
        return Err(Problem::new(UnknownUser(id.to_owned()), StatusCode::NOT_FOUND));
    }

    Ok(Builder::new(StatusCode::OK).json(&User { id: 42, name: "alice".to_owned() }))
}

// POST /users: malformed JSON becomes a 500 problem through `?`.
async fn create_user(req: Request) -> Result<Builder, Reply> {
    #[derive(Deserialize)]
    struct NewUser {
        name: String,
    }

    let input: NewUser = req.json()?;
    let user = User { id: 99, name: input.name };

    Ok(Builder::new(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(&user))
}

// DELETE /users/{id}: 204 No Content.
async fn delete_user(_req: Request) -> Builder {
    Builder::new(StatusCode::NO_CONTENT)
}

// GET /ticks: one server-sent event per second until the client leaves.
async fn ticks(_req: Request) -> Builder {
    let (events, stream) = sse::channel(8);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        for n in 0.. {
            interval.tick().await;
            let event = sse::Event::new().id(n.to_string()).event("tick").data(n.to_string());
            if events.send(event).await.is_err() {
                break;
            }
        }
    });

    Builder::new(StatusCode::OK).sse(stream)
}

async fn stats(_req: Request) -> Builder {
    Builder::new(StatusCode::OK).text("all systems nominal")
}

fn admin_only(req: &Request) -> Result<(), BoxError> {
    match req.header("authorization") {
        Some("Bearer admin") => Ok(()),
        _ => Err("admin token required".into()),
    }
}
