use std::sync::{Arc, Mutex};

use http::StatusCode;
use serde_json::Value;
use tsuki::middleware::{Authorize, Check, Logger, Problems, Recover, Transform, Validate};
use tsuki::{BoxError, Builder, ProblemControls, Request, Router};

async fn ok(_req: Request) -> Builder {
    Builder::new(StatusCode::OK).text("ok")
}

async fn explode(_req: Request) -> Builder {
    panic!("kaboom")
}

async fn unavailable(_req: Request) -> Builder {
    Builder::new(StatusCode::SERVICE_UNAVAILABLE)
}

fn get(uri: &str) -> http::Request<&'static str> {
    http::Request::get(uri).body("").unwrap()
}

#[tokio::test]
async fn recover_turns_panics_into_500_problems() {
    let router = Router::new().layer(Recover::new()).get("/", explode);

    let rec = router.record(get("/")).await;

    assert_eq!(rec.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rec.body_str(), "500\n\ninternal server error\n\nkaboom");
}

#[tokio::test]
async fn recover_with_maps_the_payload() {
    let recover = Recover::with(|_payload| BoxError::from("handler crashed"));
    let router = Router::new().layer(recover).get("/", explode);

    let rec = router.record(get("/")).await;

    assert!(rec.body_str().ends_with("handler crashed"));
}

#[tokio::test]
async fn logger_forwards_to_later_subscribers() {
    struct Count(Arc<Mutex<usize>>);

    impl tsuki::middleware::Middleware for Count {
        fn handle<'a>(
            &'a self,
            request: Request,
            writer: &'a mut dyn tsuki::ResponseWriter,
            next: tsuki::middleware::Next<'a>,
        ) -> tsuki::handler::BoxFuture<'a, ()> {
            let count = Arc::clone(&self.0);
            request.on_error(move |err, next| {
                *count.lock().unwrap() += 1;
                next.run(err);
            });
            next.run(request, writer)
        }
    }

    let count = Arc::new(Mutex::new(0));
    let router = Router::new()
        .layer(Logger)
        .layer(Count(Arc::clone(&count)))
        .get("/down", unavailable)
        .get("/up", ok);

    router.record(get("/up")).await;
    assert_eq!(*count.lock().unwrap(), 0);

    let rec = router.record(get("/down")).await;
    assert_eq!(rec.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(*count.lock().unwrap(), 1);
}

#[tokio::test]
async fn problems_installs_request_controls() {
    async fn teapot(_req: Request) -> Result<(), tsuki::Reply> {
        Err(std::io::Error::other("Short And Stout").into())
    }

    let controls = ProblemControls::new()
        .kind(|p, _| format!("https://errors.example.com/{}", p.status))
        .lowercase(|_, _| false);
    let router = Router::new().layer(Problems::new(controls)).get("/", teapot);

    let req = http::Request::get("/").header("accept", "application/json").body("").unwrap();
    let rec = router.record(req).await;
    let body: Value = rec.json().unwrap();

    assert_eq!(body["type"], "https://errors.example.com/500");
    assert_eq!(body["title"], "Internal Server Error");
    assert_eq!(body["detail"], "Short And Stout");
}

#[tokio::test]
async fn authorize_rejects_with_403() {
    let deny = |req: &Request| -> Result<(), BoxError> {
        match req.header("authorization") {
            Some("Bearer let-me-in") => Ok(()),
            _ => Err("missing token".into()),
        }
    };
    let router = Router::new().layer(Authorize::new(deny)).get("/", ok);

    let rec = router.record(get("/")).await;
    assert_eq!(rec.status(), StatusCode::FORBIDDEN);
    assert!(rec.body_str().contains("authorization failed: missing token"));

    let req = http::Request::get("/").header("authorization", "Bearer let-me-in").body("").unwrap();
    let rec = router.record(req).await;
    assert_eq!(rec.status(), StatusCode::OK);
    assert_eq!(rec.body_str(), "ok");
}

#[tokio::test]
async fn validate_rejects_with_422() {
    let non_empty = |req: &Request| -> Result<(), BoxError> {
        if req.body().is_empty() { Err("empty body".into()) } else { Ok(()) }
    };
    let router = Router::new().layer(Validate::new(non_empty)).post("/", ok);

    let rec = router.record(http::Request::post("/").body("").unwrap()).await;
    assert_eq!(rec.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(rec.body_str().contains("validation failed: empty body"));

    let rec = router.record(http::Request::post("/").body("{}").unwrap()).await;
    assert_eq!(rec.status(), StatusCode::OK);
}

#[tokio::test]
async fn check_authorizes_before_validating() {
    let validated = Arc::new(Mutex::new(0));
    let seen = Arc::clone(&validated);

    let token = |req: &Request| -> Result<(), BoxError> {
        match req.header("authorization") {
            Some(_) => Ok(()),
            None => Err("missing token".into()),
        }
    };
    let non_empty = move |req: &Request| -> Result<(), BoxError> {
        *seen.lock().unwrap() += 1;
        if req.body().is_empty() { Err("empty body".into()) } else { Ok(()) }
    };
    let router = Router::new().layer(Check::new(token, non_empty)).post("/", ok);

    let rec = router.record(http::Request::post("/").body("").unwrap()).await;
    assert_eq!(rec.status(), StatusCode::FORBIDDEN);
    assert_eq!(*validated.lock().unwrap(), 0);

    let req = http::Request::post("/").header("authorization", "x").body("").unwrap();
    let rec = router.record(req).await;
    assert_eq!(rec.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(rec.body_str().contains("validation failed: empty body"));

    let req = http::Request::post("/").header("authorization", "x").body("{}").unwrap();
    assert_eq!(router.record(req).await.status(), StatusCode::OK);
}

#[derive(Clone, Debug)]
struct Tenant(String);

#[tokio::test]
async fn transform_hands_on_the_rewritten_request() {
    async fn tenant(req: Request) -> Builder {
        let name = req.extensions().get::<Tenant>().map(|t| t.0.clone()).unwrap_or_default();
        Builder::new(StatusCode::OK).text(name)
    }

    let resolve_tenant = |mut req: Request| -> Result<Request, BoxError> {
        let name = req.header("x-tenant").ok_or("no tenant header")?.to_owned();
        req.extensions_mut().insert(Tenant(name));
        Ok(req)
    };
    let router = Router::new().layer(Transform::new(resolve_tenant)).get("/", tenant);

    let req = http::Request::get("/").header("x-tenant", "acme").body("").unwrap();
    let rec = router.record(req).await;
    assert_eq!(rec.status(), StatusCode::OK);
    assert_eq!(rec.body_str(), "acme");

    let rec = router.record(get("/")).await;
    assert_eq!(rec.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(rec.body_str().contains("transform failed: no tenant header"));
}

#[tokio::test]
async fn group_middleware_stays_in_the_group() {
    let deny = |_: &Request| -> Result<(), BoxError> { Err("admins only".into()) };

    let router = Router::new()
        .get("/public", ok)
        .group("/admin", |admin| admin.layer(Authorize::new(deny)).get("/stats", ok))
        .get("/after", ok);

    assert_eq!(router.record(get("/public")).await.status(), StatusCode::OK);
    assert_eq!(router.record(get("/admin/stats")).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(router.record(get("/after")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn with_adds_middleware_without_a_prefix() {
    let router = Router::new()
        .with(Recover::new(), |r| r.get("/safe", explode))
        .get("/plain", ok);

    assert!(router.has(&http::Method::GET, "/safe"));
    assert_eq!(router.record(get("/safe")).await.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(router.record(get("/plain")).await.status(), StatusCode::OK);
}
