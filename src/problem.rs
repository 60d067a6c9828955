//! RFC 9457 problem details.
//!
//! A [`Problem`] is both an error value and a [`Responder`]: return it from a
//! handler (or wrap it with [`failed`](crate::failed)) and it renders itself
//! through content negotiation.
//!
//! Empty fields are filled in at render time from the request's
//! [`ProblemControls`], never on the stored value:
//!
//! | Field | Default |
//! |---|---|
//! | `status` | `500` |
//! | `type` | `about:blank` |
//! | `title` | reason phrase of `status` |
//! | `instance` | request URL |
//!
//! Title and detail are then lowercased unless the controls say otherwise.
//!
//! The default renderer answers `application/problem+json` when the client's
//! `Accept` prefers JSON, and `status\n\ntitle\n\ndetail` as plain text
//! otherwise.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::accept::Accept;
use crate::builder::{Builder, ContentType};
use crate::reply::{Responder, SharedError};
use crate::request::Request;
use crate::status::{from_code, status_text};

const RESERVED: [&str; 5] = ["type", "title", "detail", "status", "instance"];

const OFFERED: [&str; 3] = ["text/plain", "application/problem+json", "application/json"];

/// A structured HTTP error.
///
/// Serialises to `{"type","title","detail","status","instance", ...additional}`
/// with the additional fields flattened into the top-level object.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Problem {
    /// URI identifying the problem type (`type` member).
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub detail: String,
    /// `0` means unset.
    pub status: u16,
    pub instance: String,
    /// Extension members, written through [`with`](Problem::with) only so
    /// they never shadow a standard member.
    #[serde(flatten)]
    additional: Map<String, Value>,
    /// The wrapped error. Not serialised.
    #[serde(skip)]
    pub source: Option<SharedError>,
}

impl Problem {
    /// A problem describing `error`: its message becomes the detail.
    pub fn new<E>(error: E, status: StatusCode) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::shared(Arc::new(error), status)
    }

    pub(crate) fn shared(error: SharedError, status: StatusCode) -> Self {
        Self {
            detail: error.to_string(),
            status: status.as_u16(),
            source: Some(error),
            ..Self::default()
        }
    }

    /// Adds an additional member. The five standard member names are ignored.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !RESERVED.contains(&key.as_str()) {
            self.additional.insert(key, value.into());
        }
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.additional.remove(key);
        self
    }

    /// Extension members.
    pub fn additional(&self) -> &Map<String, Value> {
        &self.additional
    }

    /// Attaches `error` as the source and lists its chain under `errors`.
    pub fn with_error<E>(mut self, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut chain = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(&error);
        while let Some(err) = current {
            chain.push(Value::String(err.to_string()));
            current = err.source();
        }

        self.additional.insert("errors".to_owned(), Value::Array(chain));
        self.source = Some(Arc::new(error));
        self
    }

    /// The error this problem was built from, if any.
    pub fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|err| err as &(dyn std::error::Error + 'static))
    }

    pub fn status_code(&self) -> StatusCode {
        from_code(self.status)
    }

    /// A copy with empty fields filled from the request's controls.
    pub fn defaulted(&self, request: &Request) -> Problem {
        controls(request).apply(self, request)
    }
}

impl PartialEq for Problem {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.title == other.title
            && self.detail == other.detail
            && self.status == other.status
            && self.instance == other.instance
            && self.additional == other.additional
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            f.write_str(&self.title)
        } else {
            f.write_str(&self.detail)
        }
    }
}

impl Serialize for Problem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.kind)?;
        map.serialize_entry("title", &self.title)?;
        map.serialize_entry("detail", &self.detail)?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("instance", &self.instance)?;
        for (key, value) in &self.additional {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Responder for Problem {
    fn respond(&self, request: &Request) -> Builder {
        let controls = controls(request);
        let problem = controls.apply(self, request);
        controls.render(&problem, request)
    }
}

// ── Controls ──────────────────────────────────────────────────────────────────

type StatusFn = Arc<dyn Fn(&Problem, &Request) -> u16 + Send + Sync>;
type TextFn = Arc<dyn Fn(&Problem, &Request) -> String + Send + Sync>;
type PredicateFn = Arc<dyn Fn(&Problem, &Request) -> bool + Send + Sync>;
type RenderFn = Arc<dyn Fn(&Problem, &Request) -> Builder + Send + Sync>;

/// Request-scoped policy for defaulting and rendering problems.
///
/// Attach it with the [`Problems`](crate::middleware::Problems) middleware.
/// Every resolver left unset falls back to the built-in default of the same
/// name in this module.
///
/// ```rust
/// use tsuki::ProblemControls;
///
/// let controls = ProblemControls::new()
///     .kind(|p, _| format!("https://errors.example.com/{}", p.status))
///     .lowercase(|_, _| false);
/// ```
#[derive(Clone, Default)]
pub struct ProblemControls {
    status: Option<StatusFn>,
    kind: Option<TextFn>,
    title: Option<TextFn>,
    instance: Option<TextFn>,
    lowercase: Option<PredicateFn>,
    response: Option<RenderFn>,
}

impl ProblemControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status<F>(mut self, f: F) -> Self
    where
        F: Fn(&Problem, &Request) -> u16 + Send + Sync + 'static,
    {
        self.status = Some(Arc::new(f));
        self
    }

    pub fn kind<F>(mut self, f: F) -> Self
    where
        F: Fn(&Problem, &Request) -> String + Send + Sync + 'static,
    {
        self.kind = Some(Arc::new(f));
        self
    }

    pub fn title<F>(mut self, f: F) -> Self
    where
        F: Fn(&Problem, &Request) -> String + Send + Sync + 'static,
    {
        self.title = Some(Arc::new(f));
        self
    }

    pub fn instance<F>(mut self, f: F) -> Self
    where
        F: Fn(&Problem, &Request) -> String + Send + Sync + 'static,
    {
        self.instance = Some(Arc::new(f));
        self
    }

    pub fn lowercase<F>(mut self, f: F) -> Self
    where
        F: Fn(&Problem, &Request) -> bool + Send + Sync + 'static,
    {
        self.lowercase = Some(Arc::new(f));
        self
    }

    /// Replaces content negotiation entirely.
    pub fn response<F>(mut self, f: F) -> Self
    where
        F: Fn(&Problem, &Request) -> Builder + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(f));
        self
    }

    fn apply(&self, problem: &Problem, request: &Request) -> Problem {
        let mut problem = problem.clone();

        if problem.status == 0 {
            problem.status = match &self.status {
                Some(f) => f(&problem, request),
                None => default_status(&problem, request),
            };
        }
        problem.status = from_code(problem.status).as_u16();
        if problem.kind.is_empty() {
            problem.kind = match &self.kind {
                Some(f) => f(&problem, request),
                None => default_kind(&problem, request),
            };
        }
        if problem.title.is_empty() {
            problem.title = match &self.title {
                Some(f) => f(&problem, request),
                None => default_title(&problem, request),
            };
        }
        if problem.instance.is_empty() {
            problem.instance = match &self.instance {
                Some(f) => f(&problem, request),
                None => default_instance(&problem, request),
            };
        }

        let lowercase = match &self.lowercase {
            Some(f) => f(&problem, request),
            None => default_lowercase(&problem, request),
        };
        if lowercase {
            problem.title = problem.title.to_lowercase();
            problem.detail = problem.detail.to_lowercase();
        }

        problem
    }

    fn render(&self, problem: &Problem, request: &Request) -> Builder {
        match &self.response {
            Some(f) => f(problem, request),
            None => default_response(problem, request),
        }
    }
}

impl fmt::Debug for ProblemControls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemControls")
            .field("status", &self.status.is_some())
            .field("kind", &self.kind.is_some())
            .field("title", &self.title.is_some())
            .field("instance", &self.instance.is_some())
            .field("lowercase", &self.lowercase.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}

fn controls(request: &Request) -> ProblemControls {
    request.extensions().get::<ProblemControls>().cloned().unwrap_or_default()
}

// ── Built-in defaults ─────────────────────────────────────────────────────────

pub fn default_status(_problem: &Problem, _request: &Request) -> u16 {
    StatusCode::INTERNAL_SERVER_ERROR.as_u16()
}

pub fn default_kind(_problem: &Problem, _request: &Request) -> String {
    "about:blank".to_owned()
}

pub fn default_title(problem: &Problem, _request: &Request) -> String {
    status_text(problem.status_code()).to_owned()
}

pub fn default_instance(_problem: &Problem, request: &Request) -> String {
    request.url()
}

pub fn default_lowercase(_problem: &Problem, _request: &Request) -> bool {
    true
}

/// JSON for clients preferring `application/problem+json` or
/// `application/json`, plain text for everyone else.
pub fn default_response(problem: &Problem, request: &Request) -> Builder {
    match Accept::parse(request.headers()).negotiate(&OFFERED) {
        Some("application/problem+json" | "application/json") => render_json(problem),
        _ => render_text(problem),
    }
}

/// `application/problem+json` body; falls back to text if encoding fails so
/// rendering a problem can never produce another failure.
pub fn render_json(problem: &Problem) -> Builder {
    match serde_json::to_vec(problem) {
        Ok(bytes) => Builder::new(problem.status_code()).bytes(ContentType::ProblemJson, bytes),
        Err(_) => render_text(problem),
    }
}

pub fn render_text(problem: &Problem) -> Builder {
    let body = format!("{}\n\n{}\n\n{}", problem.status, problem.title, problem.detail);
    Builder::new(problem.status_code()).bytes(ContentType::Text, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(accept: Option<&str>) -> Request {
        let mut builder = http::Request::get("/things/1?x=y");
        if let Some(accept) = accept {
            builder = builder.header("accept", accept);
        }
        Request::from(builder.body("").unwrap())
    }

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn new_takes_detail_and_status_from_error() {
        let problem = Problem::new(std::io::Error::other("Boom"), StatusCode::NOT_FOUND);

        assert_eq!(problem.detail, "Boom");
        assert_eq!(problem.status, 404);
        assert!(problem.kind.is_empty() && problem.title.is_empty() && problem.instance.is_empty());
        assert!(problem.additional.is_empty());
        assert_eq!(problem.source().map(ToString::to_string).as_deref(), Some("Boom"));
    }

    #[test]
    fn with_and_without_copy() {
        let base = Problem::default().with("user", "alice");
        let extended = base.clone().with("attempts", 3).with("status", "ignored");
        let trimmed = extended.clone().without("user");

        assert_eq!(base.additional.len(), 1);
        assert_eq!(extended.additional.get("attempts"), Some(&json!(3)));
        assert!(!extended.additional.contains_key("status"));
        assert!(!trimmed.additional.contains_key("user"));
    }

    #[test]
    fn with_error_lists_the_chain() {
        let problem = Problem::default().with_error(Outer(std::io::Error::other("inner")));

        assert_eq!(problem.additional.get("errors"), Some(&json!(["outer", "inner"])));
        assert!(problem.source().is_some());
    }

    #[test]
    fn defaulting_fills_and_lowercases_without_mutating() {
        let problem = Problem::new(std::io::Error::other("Disk Full"), StatusCode::INSUFFICIENT_STORAGE);
        let defaulted = problem.defaulted(&request(None));

        assert_eq!(defaulted.kind, "about:blank");
        assert_eq!(defaulted.title, "insufficient storage");
        assert_eq!(defaulted.detail, "disk full");
        assert_eq!(defaulted.instance, "/things/1?x=y");
        assert_eq!(problem.detail, "Disk Full");
        assert!(problem.title.is_empty());
    }

    #[test]
    fn unset_status_defaults_to_500() {
        let defaulted = Problem::default().defaulted(&request(None));

        assert_eq!(defaulted.status, 500);
        assert_eq!(defaulted.title, "internal server error");
    }

    #[test]
    fn custom_controls_from_extensions() {
        let mut req = request(None);
        req.extensions_mut().insert(
            ProblemControls::new()
                .status(|_, _| 418)
                .kind(|p, _| format!("https://errors.example.com/{}", p.status))
                .lowercase(|_, _| false),
        );

        let defaulted = Problem { detail: "Short And Stout".into(), ..Problem::default() }.defaulted(&req);

        assert_eq!(defaulted.status, 418);
        assert_eq!(defaulted.kind, "https://errors.example.com/418");
        assert_eq!(defaulted.title, "I'm a teapot");
        assert_eq!(defaulted.detail, "Short And Stout");
    }

    #[test]
    fn serialises_flat_with_all_standard_fields() {
        let problem = Problem { status: 409, ..Problem::default() }.with("conflict_id", 7);
        let value = serde_json::to_value(&problem).unwrap();

        assert_eq!(
            value,
            json!({"type": "", "title": "", "detail": "", "status": 409, "instance": "", "conflict_id": 7}),
        );
    }

    #[test]
    fn json_round_trip() {
        let problem = Problem {
            kind: "https://example.com/probs/out-of-credit".into(),
            title: "You do not have enough credit.".into(),
            detail: "Your current balance is 30, but that costs 50.".into(),
            status: 403,
            instance: "/account/12345/msgs/abc".into(),
            ..Problem::default()
        }
        .with("balance", 30)
        .with("accounts", json!(["/account/12345", "/account/67890"]))
        .with("meta", json!({"nested": {"deep": true}, "none": null}));

        let encoded = serde_json::to_string(&problem).unwrap();
        let decoded: Problem = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded, problem);
    }

    #[test]
    fn reserved_members_stay_out_of_the_extensions() {
        let problem = Problem { status: 400, ..Problem::default() }
            .with("title", "shadow")
            .with("field", "email");

        assert_eq!(problem.additional().len(), 1);
        assert!(problem.title.is_empty());

        let decoded: Problem = serde_json::from_value(json!({"title": "t", "field": "email"})).unwrap();
        assert_eq!(decoded.title, "t");
        assert_eq!(decoded.additional().keys().collect::<Vec<_>>(), vec!["field"]);

        let encoded = serde_json::to_string(&problem).unwrap();
        assert_eq!(serde_json::from_str::<Problem>(&encoded).unwrap(), problem);
    }

    #[test]
    fn out_of_range_status_renders_as_500() {
        for status in [99, 600, 700] {
            let builder = Problem { status, ..Problem::default() }.respond(&request(None));
            assert_eq!(builder.status_code(), Some(StatusCode::INTERNAL_SERVER_ERROR), "status {status}");
        }

        let defaulted = Problem { status: 700, ..Problem::default() }.defaulted(&request(None));
        assert_eq!(defaulted.status, 500);
        assert_eq!(defaulted.title, "internal server error");
    }

    #[test]
    fn negotiates_json() {
        let builder = Problem::new(std::io::Error::other("boom"), StatusCode::NOT_FOUND)
            .respond(&request(Some("application/json")));

        assert_eq!(builder.status_code(), Some(StatusCode::NOT_FOUND));
        assert_eq!(builder.headers_ref().first("content-type"), Some("application/problem+json"));
    }

    #[test]
    fn falls_back_to_text() {
        for accept in [None, Some("text/html"), Some("*/*")] {
            let builder = Problem::default().respond(&request(accept));
            assert_eq!(
                builder.headers_ref().first("content-type"),
                Some("text/plain; charset=utf-8"),
                "accept {accept:?}",
            );
        }
    }

    #[test]
    fn custom_renderer_replaces_negotiation() {
        let mut req = request(Some("application/json"));
        req.extensions_mut().insert(
            ProblemControls::new().response(|p, _| Builder::new(p.status_code()).html(format!("<h1>{}</h1>", p.title))),
        );

        let builder = Problem::default().respond(&req);

        assert_eq!(builder.headers_ref().first("content-type"), Some("text/html; charset=utf-8"));
    }
}
